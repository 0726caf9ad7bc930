//! Registry of device threads attached to one System.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hs_system::{Component, LeafHandle, System, SystemSnapshot};

use crate::device::{DeviceConfig, InputDevice, OutputDevice};
use crate::error::{DeviceError, DeviceResult};
use crate::slot::{LatestSlot, SlotReader, SlotWriter};

type ApplyFn<C> = Box<dyn FnMut(&mut System<C>) -> bool + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

struct Worker {
    name: String,
    direction: Direction,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn halt(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!(device = %self.name, "device thread panicked");
            }
        }
    }
}

/// Devices attached to a model, each on its own thread.
///
/// The integration loop calls [`poll_inputs`](Self::poll_inputs) during the
/// discrete step and [`publish`](Self::publish) after sampling. Both only
/// touch one-slot channels and return immediately.
pub struct IoRegistry<C> {
    inputs: Vec<ApplyFn<C>>,
    outputs: Vec<SlotWriter<SystemSnapshot>>,
    workers: Vec<Worker>,
}

impl<C> Default for IoRegistry<C> {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            workers: Vec::new(),
        }
    }
}

impl<C> fmt::Debug for IoRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoRegistry")
            .field("devices", &self.device_names())
            .finish()
    }
}

impl<C: 'static> IoRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an input device whose samples are applied to `handle`'s input.
    ///
    /// `apply` runs on the integration thread inside [`poll_inputs`]; the
    /// device thread only ever writes the channel.
    ///
    /// [`poll_inputs`]: Self::poll_inputs
    pub fn attach_input<S, K, D, F>(
        &mut self,
        device: D,
        handle: &LeafHandle<K>,
        config: DeviceConfig,
        mut apply: F,
    ) -> DeviceResult<()>
    where
        S: Send + 'static,
        K: Component<C>,
        D: InputDevice<S>,
        F: FnMut(S, &mut K::Input) + Send + 'static,
    {
        let (writer, reader) = LatestSlot::new();
        let name = device.name().to_string();
        let worker = spawn_worker(name, Direction::Input, config.period, move |stop, ready| {
            input_loop(device, writer, stop, config.period, ready)
        })?;
        self.workers.push(worker);

        let handle = *handle;
        self.inputs.push(Box::new(move |system: &mut System<C>| {
            let Some(sample) = reader.take() else {
                return false;
            };
            match system.input_mut(&handle) {
                Some(input) => {
                    apply(sample, input);
                    true
                }
                None => false,
            }
        }));
        Ok(())
    }

    /// Attach an output device fed with every published snapshot.
    pub fn attach_output<D>(&mut self, device: D, config: DeviceConfig) -> DeviceResult<()>
    where
        D: OutputDevice,
    {
        let (writer, reader) = LatestSlot::new();
        let name = device.name().to_string();
        let worker = spawn_worker(name, Direction::Output, config.period, move |stop, ready| {
            output_loop(device, reader, stop, config.period, ready)
        })?;
        self.workers.push(worker);
        self.outputs.push(writer);
        Ok(())
    }

    /// Apply the newest pending sample of every input device.
    ///
    /// Inputs without a new sample are left unchanged. Returns the number of
    /// samples applied.
    pub fn poll_inputs(&mut self, system: &mut System<C>) -> usize {
        let mut applied = 0;
        for apply in &mut self.inputs {
            if apply(system) {
                applied += 1;
            }
        }
        applied
    }

    /// Offer `snapshot` to every output device, replacing any unsent one.
    pub fn publish(&self, snapshot: &SystemSnapshot) {
        for writer in &self.outputs {
            writer.put(snapshot.clone());
        }
    }
}

impl<C> IoRegistry<C> {
    /// Stop every device thread and wait for it to exit.
    ///
    /// Output devices stop first and flush their last snapshot; input devices
    /// then do one final read. Anything an output device wrote to a loopback
    /// is therefore seen by the input device on the other end.
    pub fn stop_all(&mut self) {
        for direction in [Direction::Output, Direction::Input] {
            for worker in self.workers.iter_mut().filter(|w| w.direction == direction) {
                worker.halt();
            }
        }
    }

    pub fn device_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name.as_str()).collect()
    }

    /// True while any device thread is still alive.
    pub fn is_running(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.handle.as_ref().is_some_and(|h| !h.is_finished()))
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl<C> Drop for IoRegistry<C> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Spawn a named device thread and wait until its `start` hook has run.
fn spawn_worker<F>(
    name: String,
    direction: Direction,
    period: Duration,
    body: F,
) -> DeviceResult<Worker>
where
    F: FnOnce(Arc<AtomicBool>, mpsc::Sender<DeviceResult<()>>) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = mpsc::channel();
    let thread_stop = stop.clone();
    let handle = thread::Builder::new()
        .name(format!("io-{name}"))
        .spawn(move || body(thread_stop, ready_tx))
        .map_err(|e| DeviceError::Start {
            device: name.clone(),
            message: e.to_string(),
        })?;

    let started = ready_rx.recv().unwrap_or_else(|_| {
        Err(DeviceError::Start {
            device: name.clone(),
            message: "device thread exited during start".to_string(),
        })
    });
    if let Err(err) = started {
        let _ = handle.join();
        return Err(err);
    }

    tracing::debug!(device = %name, ?direction, ?period, "device attached");
    Ok(Worker {
        name,
        direction,
        stop,
        handle: Some(handle),
    })
}

fn input_loop<S, D: InputDevice<S>>(
    mut device: D,
    writer: SlotWriter<S>,
    stop: Arc<AtomicBool>,
    period: Duration,
    ready: mpsc::Sender<DeviceResult<()>>,
) {
    let started = device.start();
    let failed = started.is_err();
    let _ = ready.send(started);
    if failed {
        return;
    }

    while !stop.load(Ordering::Acquire) {
        read_once(&mut device, &writer);
        thread::park_timeout(period);
    }
    read_once(&mut device, &writer);

    if let Err(err) = device.stop() {
        tracing::warn!(device = %device.name(), %err, "input device stop failed");
    }
}

fn read_once<S, D: InputDevice<S>>(device: &mut D, writer: &SlotWriter<S>) {
    match device.read() {
        Ok(Some(sample)) => writer.put(sample),
        Ok(None) => {}
        Err(err) => tracing::warn!(device = %device.name(), %err, "input read failed"),
    }
}

fn output_loop<D: OutputDevice>(
    mut device: D,
    reader: SlotReader<SystemSnapshot>,
    stop: Arc<AtomicBool>,
    period: Duration,
    ready: mpsc::Sender<DeviceResult<()>>,
) {
    let started = device.start();
    let failed = started.is_err();
    let _ = ready.send(started);
    if failed {
        return;
    }

    while !stop.load(Ordering::Acquire) {
        flush_once(&mut device, &reader);
        thread::park_timeout(period);
    }
    flush_once(&mut device, &reader);

    tracing::debug!(
        device = %device.name(),
        dropped = reader.dropped(),
        "output device stopping"
    );
    if let Err(err) = device.stop() {
        tracing::warn!(device = %device.name(), %err, "output device stop failed");
    }
}

fn flush_once<D: OutputDevice>(device: &mut D, reader: &SlotReader<SystemSnapshot>) {
    let Some(snapshot) = reader.take() else {
        return;
    };
    if let Err(err) = device.write(&snapshot) {
        tracing::warn!(device = %device.name(), %err, "snapshot dropped");
    }
}
