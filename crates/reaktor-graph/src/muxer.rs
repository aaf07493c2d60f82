//! Per-module output buffering for concurrent builds.
//!
//! Workers building different modules write into the same logical console;
//! the muxer defers those writes into per-module buffers so the final
//! output shows each module's bytes contiguously, in declared order,
//! regardless of which build finished first.
//!
//! Buffer appends are guarded per module, so two modules never contend on
//! the write path. One registry mutex covers thread routing and the
//! close-time quiesce.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use tracing::trace;

use reaktor_core::module::ModuleId;
use reaktor_util::errors::{ReaktorError, ReaktorResult};

struct ModuleBuffer {
    id: ModuleId,
    bytes: Mutex<Vec<u8>>,
    completed: AtomicBool,
}

struct Registry {
    buffers: Vec<Arc<ModuleBuffer>>,
    index: HashMap<ModuleId, usize>,
    routes: HashMap<ThreadId, usize>,
    /// Bytes from threads with no associated module, flushed last.
    stray: Vec<u8>,
    active_writes: usize,
    closed: bool,
}

/// Multiplexes interleaved worker output into contiguous per-module chunks.
pub struct OutputMuxer {
    registry: Mutex<Registry>,
    quiesce: Condvar,
}

impl OutputMuxer {
    /// Create the muxer with one buffer per module, in declared order.
    /// That order, not completion order, decides the final flush order.
    pub fn new(declared: impl IntoIterator<Item = ModuleId>) -> Self {
        let mut buffers = Vec::new();
        let mut index = HashMap::new();
        for id in declared {
            if index.contains_key(&id) {
                continue;
            }
            index.insert(id.clone(), buffers.len());
            buffers.push(Arc::new(ModuleBuffer {
                id,
                bytes: Mutex::new(Vec::new()),
                completed: AtomicBool::new(false),
            }));
        }
        Self {
            registry: Mutex::new(Registry {
                buffers,
                index,
                routes: HashMap::new(),
                stray: Vec::new(),
                active_writes: 0,
                closed: false,
            }),
            quiesce: Condvar::new(),
        }
    }

    /// Route all subsequent writes from the calling thread to `module`.
    ///
    /// Modules not declared up front are appended in first-associate order.
    pub fn associate(&self, module: &ModuleId) {
        let mut registry = self.registry.lock().expect("muxer registry poisoned");
        let idx = match registry.index.get(module) {
            Some(&idx) => idx,
            None => {
                let idx = registry.buffers.len();
                registry.index.insert(module.clone(), idx);
                registry.buffers.push(Arc::new(ModuleBuffer {
                    id: module.clone(),
                    bytes: Mutex::new(Vec::new()),
                    completed: AtomicBool::new(false),
                }));
                idx
            }
        };
        registry.routes.insert(thread::current().id(), idx);
        trace!(module = %module, "thread associated");
    }

    /// Close the module's buffer and unbind any threads routed to it.
    /// Later writes from those threads land in the stray buffer rather
    /// than being dropped.
    pub fn complete(&self, module: &ModuleId) {
        let mut registry = self.registry.lock().expect("muxer registry poisoned");
        if let Some(&idx) = registry.index.get(module) {
            registry.buffers[idx].completed.store(true, Ordering::Release);
            registry.routes.retain(|_, routed| *routed != idx);
        }
    }

    fn append(&self, buf: &[u8]) -> io::Result<usize> {
        let mut registry = self.registry.lock().expect("muxer registry poisoned");
        if registry.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "output muxer is closed",
            ));
        }
        let target = registry
            .routes
            .get(&thread::current().id())
            .map(|&idx| Arc::clone(&registry.buffers[idx]))
            .filter(|buffer| !buffer.completed.load(Ordering::Acquire));

        match target {
            Some(buffer) => {
                registry.active_writes += 1;
                drop(registry);
                buffer
                    .bytes
                    .lock()
                    .expect("module buffer poisoned")
                    .extend_from_slice(buf);
                let mut registry = self.registry.lock().expect("muxer registry poisoned");
                registry.active_writes -= 1;
                if registry.active_writes == 0 {
                    self.quiesce.notify_all();
                }
            }
            None => registry.stray.extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    /// Quiesce, then flush every buffer contiguously in declared order,
    /// with stray bytes last. May be called once.
    pub fn close<W: io::Write>(&self, sink: &mut W) -> ReaktorResult<()> {
        let mut registry = self.registry.lock().expect("muxer registry poisoned");
        if registry.closed {
            return Err(ReaktorError::Generic {
                message: "output muxer already closed".to_string(),
            }
            .into());
        }
        registry.closed = true;
        while registry.active_writes > 0 {
            registry = self
                .quiesce
                .wait(registry)
                .expect("muxer registry poisoned");
        }
        for buffer in &registry.buffers {
            let bytes = buffer.bytes.lock().expect("module buffer poisoned");
            if !bytes.is_empty() {
                trace!(module = %buffer.id, bytes = bytes.len(), "flushing module output");
            }
            sink.write_all(&bytes).map_err(ReaktorError::Io)?;
        }
        sink.write_all(&registry.stray).map_err(ReaktorError::Io)?;
        sink.flush().map_err(ReaktorError::Io)?;
        Ok(())
    }
}

impl io::Write for &OutputMuxer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn id(name: &str) -> ModuleId {
        ModuleId::new("g", name, "1")
    }

    #[test]
    fn declared_order_wins_over_completion_order() {
        let muxer = OutputMuxer::new([id("a"), id("b"), id("c")]);

        // Finish the modules in reverse declared order from three threads.
        std::thread::scope(|scope| {
            for (name, fill) in [("c", b'C'), ("b", b'B'), ("a", b'A')] {
                let muxer = &muxer;
                scope.spawn(move || {
                    muxer.associate(&id(name));
                    let mut out = muxer;
                    for _ in 0..10 {
                        out.write_all(&[fill]).unwrap();
                    }
                    muxer.complete(&id(name));
                });
            }
        });

        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        let expected: Vec<u8> = [b'A', b'B', b'C']
            .iter()
            .flat_map(|&c| std::iter::repeat(c).take(10))
            .collect();
        assert_eq!(sink, expected);
    }

    #[test]
    fn byte_count_is_preserved() {
        let muxer = OutputMuxer::new([id("a"), id("b")]);
        std::thread::scope(|scope| {
            for (name, len) in [("a", 100usize), ("b", 57)] {
                let muxer = &muxer;
                scope.spawn(move || {
                    muxer.associate(&id(name));
                    let mut out = muxer;
                    out.write_all(&vec![b'x'; len]).unwrap();
                });
            }
        });
        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        assert_eq!(sink.len(), 157);
    }

    #[test]
    fn unassociated_writes_go_to_stray_buffer() {
        let muxer = OutputMuxer::new([id("a")]);
        muxer.associate(&id("a"));
        let mut out = &muxer;
        out.write_all(b"module").unwrap();

        std::thread::scope(|scope| {
            let muxer = &muxer;
            scope.spawn(move || {
                let mut out = muxer;
                out.write_all(b" stray").unwrap();
            });
        });

        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        assert_eq!(sink, b"module stray");
    }

    #[test]
    fn writes_after_complete_are_not_lost() {
        let muxer = OutputMuxer::new([id("a")]);
        muxer.associate(&id("a"));
        let mut out = &muxer;
        out.write_all(b"before").unwrap();
        muxer.complete(&id("a"));
        out.write_all(b"after").unwrap();

        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        assert_eq!(sink, b"beforeafter");
    }

    #[test]
    fn late_module_appended_after_declared() {
        let muxer = OutputMuxer::new([id("a")]);
        muxer.associate(&id("late"));
        let mut out = &muxer;
        out.write_all(b"L").unwrap();
        muxer.associate(&id("a"));
        out.write_all(b"A").unwrap();

        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        assert_eq!(sink, b"AL");
    }

    #[test]
    fn double_close_is_an_error() {
        let muxer = OutputMuxer::new([id("a")]);
        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        assert!(muxer.close(&mut sink).is_err());
    }

    #[test]
    fn write_after_close_fails() {
        let muxer = OutputMuxer::new([id("a")]);
        muxer.associate(&id("a"));
        let mut sink = Vec::new();
        muxer.close(&mut sink).unwrap();
        let mut out = &muxer;
        assert!(out.write_all(b"x").is_err());
    }
}
