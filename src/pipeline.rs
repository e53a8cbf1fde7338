//! Pipeline components and their execution
//!
//! # Overview
//!
//! A pipeline is a graph of [`SampleBuffer`]s connected by components. A
//! [`Transformer`] reads time-aligned frames from one or more buffers and
//! writes its result into a new buffer, which is created and owned by the
//! [`Pipeline`]. A [`Consumer`] reads frames but has no downstream buffer;
//! writers and feedback actuators are consumers.
//!
//! Every component runs in its own task after [`Pipeline::start`] and passes
//! through the [`Lifecycle`] states. Components are entered when added (so
//! that the pipeline can size the downstream buffer), processing starts with
//! the task, and flushing happens when the task ends.
//!
//! # Errors
//!
//! Configuration errors are returned when a component is added.
//! Errors at runtime ([`Error::Overflow`], [`Error::Timeout`], errors from
//! the component itself) end the component's task. They are logged, trip the
//! global stop signal so that all other components end as well, and are
//! returned from [`Pipeline::stop`] or [`Pipeline::wait`].
//!
//! A closed source buffer marks the end of its stream: a component reading
//! from it processes all remaining complete frames and then ends normally,
//! closing its own output in turn.

use crate::buffer::SampleBuffer;
use crate::error::{config_error, Error, Result};
use crate::numbers::*;
use crate::samples::{Frame, StreamInfo};
use crate::sync::stop::{self, StopHandle, StopToken};
use crate::synchronizer::{FrameSynchronizer, SynchronizerConfig};

use tokio::task::{spawn, JoinHandle};
use tracing::{debug, error, info, warn};

use std::sync::Arc;

/// State of a pipeline component
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lifecycle {
    /// Constructed, no resources allocated
    Created,
    /// Input rates known, resources allocated
    Entered,
    /// Running synchronizer cycles
    Processing,
    /// Stopped and resources released
    Flushed,
    /// Disconnected, will not be used again
    Destroyed,
}

impl Lifecycle {
    /// Whether a component may go from `self` to `to`
    pub fn can_advance(self, to: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, to),
            (Created, Entered)
                | (Entered, Processing)
                | (Processing, Flushed)
                | (Flushed, Entered)
                | (Flushed, Destroyed)
                | (Created, Destroyed)
        )
    }
    /// Change state, failing with [`Error::Lifecycle`] on illegal transitions
    pub fn advance(&mut self, to: Lifecycle) -> Result<()> {
        if !self.can_advance(to) {
            return Err(Error::Lifecycle { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

/// Lifecycle hooks shared by all pipeline components
///
/// Only [`enter`] must be provided; it receives the description of every
/// input stream and should validate the component's configuration against
/// it and allocate its working memory.
///
/// [`enter`]: Component::enter
pub trait Component: Send + 'static {
    /// Name used in log messages
    fn name(&self) -> &str;
    /// Acquire external resources, called by [`Pipeline::start`]
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }
    /// Prepare for processing frames of the given input streams
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()>;
    /// Release resources after the last frame
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
    /// Release external resources
    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Component turning input frames into an output stream
pub trait Transformer<T, U>: Component {
    /// Values per output sample
    fn output_dimension(&self, inputs: &[StreamInfo]) -> usize;
    /// Output samples per frame, given the samples per input frame
    fn output_samples(&self, input_samples: &[usize]) -> usize {
        let _ = input_samples;
        1
    }
    /// Whether every input sample is passed on as one output sample
    ///
    /// Such transformers are rejected on overlapping frames, where they would
    /// repeat samples in the output stream.
    fn passes_samples_through(&self) -> bool {
        false
    }
    /// Names of the output dimensions
    fn output_labels(&self, inputs: &[StreamInfo]) -> Vec<String> {
        (0..self.output_dimension(inputs))
            .map(|d| format!("{}{}", self.name(), d))
            .collect()
    }
    /// Process one frame per input
    ///
    /// `output` is empty on entry. It must either stay empty (no output for
    /// this frame) or receive exactly
    /// `output_samples * output_dimension` values.
    fn transform(&mut self, frames: &[Frame<T>], output: &mut Vec<U>) -> Result<()>;
}

/// Terminal component receiving frames
pub trait Consumer<T>: Component {
    /// Process one frame per input
    fn consume(&mut self, frames: &[Frame<T>]) -> Result<()>;
}

struct Stage<C> {
    component: C,
    state: Lifecycle,
}

impl<C: Component> Stage<C> {
    fn new(component: C) -> Self {
        Self {
            component,
            state: Lifecycle::Created,
        }
    }
    fn transition(&mut self, to: Lifecycle) -> Result<()> {
        self.state.advance(to)?;
        info!("{}: {:?}", self.component.name(), to);
        Ok(())
    }
    fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
        self.component.enter(inputs)?;
        self.transition(Lifecycle::Entered)
    }
    fn flush(&mut self) -> Result<()> {
        self.transition(Lifecycle::Flushed)?;
        self.component.flush()
    }
    fn destroy(&mut self) -> Result<()> {
        self.transition(Lifecycle::Destroyed)?;
        self.component.disconnect()
    }
}

fn source_infos<T: Sample>(sources: &[Arc<SampleBuffer<T>>]) -> Vec<StreamInfo> {
    sources.iter().map(|source| source.info()).collect()
}

trait Task: Send {
    fn name(&self) -> &str;
    fn connect(&mut self) -> Result<()>;
    fn spawn(self: Box<Self>, stop: StopToken, abort: Arc<StopHandle>) -> JoinHandle<Result<()>>;
}

struct TransformerTask<T, U, C> {
    stage: Stage<C>,
    sync: FrameSynchronizer<T>,
    output: Arc<SampleBuffer<U>>,
    input_samples: Vec<usize>,
    output_samples: usize,
    dimension: usize,
}

impl<T, U, C> TransformerTask<T, U, C>
where
    T: Sample,
    U: Sample,
    C: Transformer<T, U>,
{
    fn resize_output(&mut self, input_samples: Vec<usize>) -> Result<()> {
        let name = self.stage.component.name();
        let samples = self.stage.component.output_samples(&input_samples);
        if samples == 0 {
            return Err(Error::InvalidInput(format!(
                "{} produces no output for frames of {:?} samples",
                name, input_samples
            )));
        }
        let rate = self.sync.output_rate(samples);
        if rate != self.output.sample_rate() {
            warn!(
                "{}: output rate changes from {} Hz to {} Hz",
                name,
                self.output.sample_rate(),
                rate
            );
            self.output.set_sample_rate(rate)?;
        }
        self.input_samples = input_samples;
        self.output_samples = samples;
        Ok(())
    }
    async fn process(&mut self, stop: &StopToken) -> Result<()> {
        let mut output = Vec::with_capacity(self.output_samples * self.dimension);
        while let Some(frames) = self.sync.next_frames(stop).await? {
            output.clear();
            self.stage.component.transform(&frames, &mut output)?;
            let input_samples: Vec<usize> = frames.iter().map(Frame::num_samples).collect();
            if input_samples != self.input_samples {
                self.resize_output(input_samples)?;
            }
            let expected = self.output_samples * self.dimension;
            if !output.is_empty() {
                if output.len() != expected {
                    return Err(Error::InvalidInput(format!(
                        "{} produced {} values, expected {}",
                        self.stage.component.name(),
                        output.len(),
                        expected
                    )));
                }
                self.output.write(&output)?;
            }
            self.sync.advance();
        }
        Ok(())
    }
}

impl<T, U, C> Task for TransformerTask<T, U, C>
where
    T: Sample,
    U: Sample,
    C: Transformer<T, U>,
{
    fn name(&self) -> &str {
        self.stage.component.name()
    }
    fn connect(&mut self) -> Result<()> {
        self.stage.component.connect()
    }
    fn spawn(mut self: Box<Self>, stop: StopToken, abort: Arc<StopHandle>) -> JoinHandle<Result<()>> {
        spawn(async move {
            self.stage.transition(Lifecycle::Processing)?;
            let result = end_of_stream(self.process(&stop).await);
            self.output.close();
            finish(&mut self.stage, result, &abort)
        })
    }
}

struct ConsumerTask<T, C> {
    stage: Stage<C>,
    sync: FrameSynchronizer<T>,
}

impl<T, C> ConsumerTask<T, C>
where
    T: Sample,
    C: Consumer<T>,
{
    async fn process(&mut self, stop: &StopToken) -> Result<()> {
        while let Some(frames) = self.sync.next_frames(stop).await? {
            self.stage.component.consume(&frames)?;
            self.sync.advance();
        }
        Ok(())
    }
}

impl<T, C> Task for ConsumerTask<T, C>
where
    T: Sample,
    C: Consumer<T>,
{
    fn name(&self) -> &str {
        self.stage.component.name()
    }
    fn connect(&mut self) -> Result<()> {
        self.stage.component.connect()
    }
    fn spawn(mut self: Box<Self>, stop: StopToken, abort: Arc<StopHandle>) -> JoinHandle<Result<()>> {
        spawn(async move {
            self.stage.transition(Lifecycle::Processing)?;
            let result = end_of_stream(self.process(&stop).await);
            finish(&mut self.stage, result, &abort)
        })
    }
}

fn end_of_stream(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::Closed) => {
            debug!("input closed, ending");
            Ok(())
        }
        result => result,
    }
}

fn finish<C: Component>(stage: &mut Stage<C>, result: Result<()>, abort: &StopHandle) -> Result<()> {
    if let Err(err) = &result {
        error!("{} failed: {}", stage.component.name(), err);
        abort.stop();
    }
    let flushed = stage.flush().and_then(|()| stage.destroy());
    if let Err(err) = &flushed {
        warn!("{} could not be released: {}", stage.component.name(), err);
    }
    result.and(flushed)
}

/// Set of components running concurrently
pub struct Pipeline {
    stop: Arc<StopHandle>,
    token: StopToken,
    pending: Vec<Box<dyn Task>>,
    running: Vec<(String, JoinHandle<Result<()>>)>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Empty pipeline
    pub fn new() -> Self {
        let (stop, token) = stop::channel();
        Self {
            stop: Arc::new(stop),
            token,
            pending: Vec::new(),
            running: Vec::new(),
        }
    }
    /// Token that is signalled when the pipeline stops
    pub fn stop_token(&self) -> StopToken {
        self.token.clone()
    }
    /// Create a buffer for an external producer (e.g. a sensor), holding
    /// `buffer_seconds` worth of samples
    pub fn add_source<T: Sample>(
        &mut self,
        info: StreamInfo,
        buffer_seconds: f64,
    ) -> Result<Arc<SampleBuffer<T>>> {
        info!(
            "adding source: {} Hz x {} {:?}",
            info.sample_rate, info.dimension, info.kind
        );
        Ok(Arc::new(SampleBuffer::with_duration(info, buffer_seconds)?))
    }
    /// Add a transformer reading from `sources`
    ///
    /// The transformer is entered immediately. Returns the buffer receiving
    /// its output, sized to hold `buffer_seconds` worth of samples.
    pub fn add_transformer<T, U, C>(
        &mut self,
        sources: Vec<Arc<SampleBuffer<T>>>,
        transformer: C,
        config: SynchronizerConfig,
        buffer_seconds: f64,
    ) -> Result<Arc<SampleBuffer<U>>>
    where
        T: Sample,
        U: Sample,
        C: Transformer<T, U>,
    {
        let mut stage = Stage::new(transformer);
        let inputs = source_infos(&sources);
        let sync = FrameSynchronizer::new(sources, config)?;
        if stage.component.passes_samples_through() {
            if let Some(i) =
                (0..inputs.len()).find(|&i| sync.step_samples(i) != sync.frame_samples(i) as u64)
            {
                return Err(config_error(format!(
                    "{} passes samples through and cannot read overlapping frames \
                     (source {}: {} samples per frame, step {})",
                    stage.component.name(),
                    i,
                    sync.frame_samples(i),
                    sync.step_samples(i)
                )));
            }
        }
        stage.enter(&inputs)?;
        let component = &stage.component;
        let frame_samples: Vec<usize> = (0..inputs.len()).map(|i| sync.frame_samples(i)).collect();
        let samples = component.output_samples(&frame_samples);
        let dimension = component.output_dimension(&inputs);
        if samples == 0 || dimension == 0 {
            return Err(config_error(format!(
                "{} produces empty output ({} samples x {})",
                component.name(),
                samples,
                dimension
            )));
        }
        let info = StreamInfo::new(sync.output_rate(samples), dimension, U::KIND)?
            .with_labels(component.output_labels(&inputs))?
            .with_start_time(inputs[0].start_time);
        info!(
            "{}: output {} Hz x {} {:?}",
            component.name(),
            info.sample_rate,
            info.dimension,
            info.kind
        );
        let output = Arc::new(SampleBuffer::with_duration(info, buffer_seconds)?);
        self.pending.push(Box::new(TransformerTask {
            stage,
            sync,
            output: output.clone(),
            input_samples: frame_samples,
            output_samples: samples,
            dimension,
        }));
        Ok(output)
    }
    /// Add a consumer reading from `sources`
    ///
    /// The consumer is entered immediately.
    pub fn add_consumer<T, C>(
        &mut self,
        sources: Vec<Arc<SampleBuffer<T>>>,
        consumer: C,
        config: SynchronizerConfig,
    ) -> Result<()>
    where
        T: Sample,
        C: Consumer<T>,
    {
        let mut stage = Stage::new(consumer);
        let inputs = source_infos(&sources);
        let sync = FrameSynchronizer::new(sources, config)?;
        stage.enter(&inputs)?;
        self.pending.push(Box::new(ConsumerTask { stage, sync }));
        Ok(())
    }
    /// Connect all added components and start their tasks
    ///
    /// If a component fails to connect, no further tasks are started and the
    /// error is returned. Components added after this call are started by
    /// another call.
    pub fn start(&mut self) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(Error::Closed);
        }
        for mut task in self.pending.drain(..) {
            task.connect()?;
            let name = task.name().to_string();
            debug!("{}: spawning", name);
            let handle = task.spawn(self.token.clone(), self.stop.clone());
            self.running.push((name, handle));
        }
        Ok(())
    }
    /// Signal all components to stop and wait for them
    ///
    /// Returns the first error reported by any component.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping pipeline");
        self.stop.stop();
        self.wait().await
    }
    /// Wait until all components have ended
    ///
    /// Components end when stopped, when their input streams are closed, or
    /// on error. Returns the first error reported by any component.
    pub async fn wait(&mut self) -> Result<()> {
        let mut first = None;
        for (name, handle) in self.running.drain(..) {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    error!("{} task failed: {}", name, err);
                    Err(Error::from(err))
                }
            };
            if let Err(err) = result {
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbers::NumericKind;
    use parking_lot::Mutex;

    struct Sum;
    impl Component for Sum {
        fn name(&self) -> &str {
            "Sum"
        }
        fn enter(&mut self, inputs: &[StreamInfo]) -> Result<()> {
            match inputs {
                [input] if input.dimension <= 2 => Ok(()),
                _ => Err(config_error("Sum expects one input of up to two dimensions")),
            }
        }
    }
    impl Transformer<i16, f32> for Sum {
        fn output_dimension(&self, _: &[StreamInfo]) -> usize {
            1
        }
        fn transform(&mut self, frames: &[Frame<i16>], output: &mut Vec<f32>) -> Result<()> {
            output.push(frames[0].values.iter().map(|&x| x as f32).sum());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Collect {
        values: Arc<Mutex<Vec<f32>>>,
        states: Arc<Mutex<Vec<&'static str>>>,
        fail_after: Option<usize>,
    }
    impl Component for Collect {
        fn name(&self) -> &str {
            "Collect"
        }
        fn connect(&mut self) -> Result<()> {
            self.states.lock().push("connect");
            Ok(())
        }
        fn enter(&mut self, _: &[StreamInfo]) -> Result<()> {
            self.states.lock().push("enter");
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            self.states.lock().push("flush");
            Ok(())
        }
        fn disconnect(&mut self) -> Result<()> {
            self.states.lock().push("disconnect");
            Ok(())
        }
    }
    impl Consumer<f32> for Collect {
        fn consume(&mut self, frames: &[Frame<f32>]) -> Result<()> {
            let mut values = self.values.lock();
            values.extend_from_slice(&frames[0].values);
            match self.fail_after {
                Some(n) if values.len() >= n => Err(Error::InvalidInput("enough".into())),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut state = Lifecycle::Created;
        assert!(state.advance(Lifecycle::Processing).is_err());
        state.advance(Lifecycle::Entered).unwrap();
        state.advance(Lifecycle::Processing).unwrap();
        assert!(matches!(
            state.advance(Lifecycle::Entered),
            Err(Error::Lifecycle {
                from: Lifecycle::Processing,
                to: Lifecycle::Entered
            })
        ));
        state.advance(Lifecycle::Flushed).unwrap();
        assert!(state.advance(Lifecycle::Processing).is_err());
        state.advance(Lifecycle::Entered).unwrap();
        assert_eq!(state, Lifecycle::Entered);
    }
    #[test]
    fn test_transformer_output_stream() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(100.0, 2, NumericKind::Short).unwrap();
        let source = pipeline.add_source::<i16>(info, 1.0).unwrap();
        let config = SynchronizerConfig::new(0.1).with_delta(0.05);
        let output: Arc<SampleBuffer<f32>> = pipeline
            .add_transformer(vec![source], Sum, config, 2.0)
            .unwrap();
        assert_eq!(output.sample_rate(), 20.0);
        assert_eq!(output.dimension(), 1);
        assert_eq!(output.info().labels, vec!["Sum0"]);
        assert_eq!(output.capacity(), 40);
    }
    #[test]
    fn test_setup_errors() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(2.0, 1, NumericKind::Float).unwrap();
        let source = pipeline.add_source::<f32>(info, 10.0).unwrap();
        let collect = Collect::default();
        assert!(matches!(
            pipeline.add_consumer(vec![source], collect.clone(), SynchronizerConfig::new(0.1)),
            Err(Error::Config(_))
        ));
        assert!(collect.states.lock().is_empty());
    }
    #[tokio::test]
    async fn test_chain_runs_until_source_closed() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(100.0, 1, NumericKind::Short).unwrap();
        let source = pipeline.add_source::<i16>(info, 1.0).unwrap();
        let sums = pipeline
            .add_transformer(
                vec![source.clone()],
                Sum,
                SynchronizerConfig::new(0.1),
                1.0,
            )
            .unwrap();
        let collect = Collect::default();
        pipeline
            .add_consumer(vec![sums], collect.clone(), SynchronizerConfig::new(0.2))
            .unwrap();
        pipeline.start().unwrap();
        for _ in 0..10 {
            source.write(&[1; 10]).unwrap();
            tokio::task::yield_now().await;
        }
        source.close();
        pipeline.wait().await.unwrap();
        assert_eq!(*collect.values.lock(), vec![10.0; 10]);
        assert_eq!(
            *collect.states.lock(),
            vec!["enter", "connect", "flush", "disconnect"]
        );
    }
    #[tokio::test]
    async fn test_stop_while_waiting() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(10.0, 1, NumericKind::Float).unwrap();
        let source = pipeline.add_source::<f32>(info, 5.0).unwrap();
        let collect = Collect::default();
        pipeline
            .add_consumer(vec![source.clone()], collect.clone(), SynchronizerConfig::new(1.0))
            .unwrap();
        pipeline.start().unwrap();
        source.write(&[0.5; 5]).unwrap();
        pipeline.stop().await.unwrap();
        assert!(collect.values.lock().is_empty());
        assert!(pipeline.stop_token().is_stopped());
        assert!(pipeline.start().is_err());
    }
    #[tokio::test]
    async fn test_fatal_error_stops_everything() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(10.0, 1, NumericKind::Float).unwrap();
        let source = pipeline.add_source::<f32>(info.clone(), 5.0).unwrap();
        let idle = pipeline.add_source::<f32>(info, 5.0).unwrap();
        let failing = Collect {
            fail_after: Some(20),
            ..Default::default()
        };
        let waiting = Collect::default();
        pipeline
            .add_consumer(vec![source.clone()], failing, SynchronizerConfig::new(1.0))
            .unwrap();
        pipeline
            .add_consumer(vec![idle], waiting.clone(), SynchronizerConfig::new(1.0))
            .unwrap();
        pipeline.start().unwrap();
        source.write(&[1.0; 30]).unwrap();
        assert!(matches!(pipeline.wait().await, Err(Error::InvalidInput(_))));
        assert!(pipeline.stop_token().is_stopped());
        assert_eq!(waiting.states.lock().last(), Some(&"disconnect"));
    }
    #[tokio::test]
    async fn test_overflow_is_fatal() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(100.0, 1, NumericKind::Short).unwrap();
        let source = pipeline.add_source::<i16>(info, 1.0).unwrap();
        let sums: Arc<SampleBuffer<f32>> = pipeline
            .add_transformer(vec![source.clone()], Sum, SynchronizerConfig::new(0.1), 0.5)
            .unwrap();
        assert_eq!(sums.capacity(), 5);
        let _frozen = sums.register_reader(0);
        pipeline.start().unwrap();
        source.write(&[1; 100]).unwrap();
        assert!(matches!(
            pipeline.wait().await,
            Err(Error::Overflow { capacity: 5, .. })
        ));
        assert!(pipeline.stop_token().is_stopped());
        assert!(sums.is_closed());
        assert_eq!(sums.write_position(), 5);
    }
    #[tokio::test]
    async fn test_timeout_is_fatal() {
        let mut pipeline = Pipeline::new();
        let info = StreamInfo::new(10.0, 1, NumericKind::Float).unwrap();
        let source = pipeline.add_source::<f32>(info, 5.0).unwrap();
        let collect = Collect::default();
        let config = SynchronizerConfig::new(1.0).with_timeout(0.05);
        pipeline
            .add_consumer(vec![source.clone()], collect.clone(), config)
            .unwrap();
        pipeline.start().unwrap();
        source.write(&[0.5; 5]).unwrap();
        assert!(matches!(pipeline.wait().await, Err(Error::Timeout(_))));
        assert!(pipeline.stop_token().is_stopped());
        assert!(collect.values.lock().is_empty());
        assert_eq!(collect.states.lock().last(), Some(&"disconnect"));
    }
}
