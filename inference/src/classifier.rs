/// Classification pipeline - background preprocessing and inference
///
/// Every call is dispatched to a tokio blocking pool (threads are spawned
/// on demand and reused while idle) and reports through a write-once
/// [`Completion`]:
/// - preprocessing of concurrent calls runs in parallel
/// - engine calls are serialized by the session lock
/// - `close` waits for all work dispatched before it
use crate::completion::{completion, Completion};
use crate::engine_trait::EngineLoader;
use crate::error::{ClassifierError, Result};
use crate::model_resource::ModelResource;
use crate::postprocessing::decode_scores;
use crate::preprocessing::ImagePreprocessor;
use crate::session::{InferenceSession, SessionStatus};
use crate::types::{
    ClassificationResult, ClassifierConfig, ModelShape, NormalizedPixelBuffer, RasterImage,
};
use log::{debug, info};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::watch;

/// Counts dispatched units of work that have not finished yet
struct InFlight {
    count: watch::Sender<usize>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self {
            count: watch::channel(0).0,
        }
    }
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.send_modify(|c| *c += 1);
        InFlightGuard {
            tracker: Arc::clone(self),
        }
    }

    fn pending(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no dispatched work is outstanding
    async fn idle(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|&c| c == 0).await;
    }
}

struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.count.send_modify(|c| *c -= 1);
    }
}

/// Asynchronous digit classifier
pub struct ClassificationPipeline {
    session: Arc<Mutex<InferenceSession>>,
    resource: ModelResource,
    preprocessor: Arc<ImagePreprocessor>,
    in_flight: Arc<InFlight>,
    closing: AtomicBool,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl ClassificationPipeline {
    /// Build a pipeline with the engine selected by `config.engine`
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let loader = config.engine.loader(&config.stub_input_dims)?;
        Self::with_loader(config, loader)
    }

    /// Build a pipeline around a caller-provided engine loader
    pub fn with_loader(config: ClassifierConfig, loader: Arc<dyn EngineLoader>) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.max_worker_threads)
            .thread_keep_alive(Duration::from_millis(config.worker_keep_alive_ms))
            .thread_name("digit-classifier")
            .build()?;

        let mut preprocessor = ImagePreprocessor::new(config.resize_quality);
        if let Some(blur) = config.blur {
            preprocessor = preprocessor.with_blur(blur)?;
        }

        info!(
            "Classification pipeline created: engine {}, model '{}'",
            loader.name(),
            config.model_resource().name()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(InferenceSession::new(loader))),
            resource: config.model_resource(),
            preprocessor: Arc::new(preprocessor),
            in_flight: Arc::new(InFlight::default()),
            closing: AtomicBool::new(false),
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Use a different model resource than the configured one
    pub fn with_resource(mut self, resource: ModelResource) -> Self {
        self.resource = resource;
        self
    }

    pub fn status(&self) -> SessionStatus {
        self.session.lock().status()
    }

    pub fn is_initialized(&self) -> bool {
        self.status() == SessionStatus::Ready
    }

    pub fn model_shape(&self) -> Option<ModelShape> {
        self.session.lock().model_shape()
    }

    /// Load the model in the background
    pub fn initialize(&self) -> Completion<ModelShape> {
        let session = Arc::clone(&self.session);
        let resource = self.resource.clone();
        self.dispatch("initialize", move || session.lock().initialize(&resource))
    }

    /// Classify a drawing in the background.
    ///
    /// Lifecycle errors (not initialized, closed) arrive through the
    /// returned handle like any other failure.
    pub fn classify_async(&self, image: RasterImage) -> Completion<ClassificationResult> {
        let session = Arc::clone(&self.session);
        let preprocessor = Arc::clone(&self.preprocessor);
        self.dispatch("classify", move || {
            run_classification(&session, &preprocessor, &image)
        })
    }

    /// Classify and block until the result is ready
    pub fn classify(&self, image: RasterImage) -> Result<ClassificationResult> {
        self.classify_async(image).wait()
    }

    /// Resize and normalize a drawing to the loaded model's input size
    pub fn preprocess(&self, image: &RasterImage) -> Result<NormalizedPixelBuffer> {
        let shape = self.session.lock().ready()?.shape();
        self.preprocessor.normalize(image, &shape)
    }

    /// Release the model once every unit of work dispatched before this
    /// call has finished. Work requested afterwards fails with
    /// `SessionClosed`. Closing more than once is harmless.
    pub fn close(&self) -> Completion<()> {
        self.closing.store(true, Ordering::SeqCst);

        let (source, handle) = completion();
        let session = Arc::clone(&self.session);
        let in_flight = Arc::clone(&self.in_flight);
        self.handle.spawn(async move {
            debug!("Close requested, {} unit(s) of work pending", in_flight.pending());
            in_flight.idle().await;
            session.lock().close();
            source.succeed(());
        });
        handle
    }

    fn dispatch<T, F>(&self, task: &'static str, work: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let guard = self.in_flight.enter();
        if self.closing.load(Ordering::SeqCst) {
            debug!("Rejecting {} request: pipeline is closing", task);
            return Completion::ready(Err(ClassifierError::SessionClosed));
        }

        let (source, handle) = completion();
        self.handle.spawn_blocking(move || {
            let _guard = guard;
            let outcome = panic::catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|payload| Err(ClassifierError::worker_panic(task, payload)));
            source.complete(outcome);
        });
        handle
    }
}

impl Drop for ClassificationPipeline {
    fn drop(&mut self) {
        let in_async_context = Handle::try_current().is_ok();
        let closed = self.close();
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        if in_async_context {
            // blocking is not allowed here; queued work keeps running detached
            runtime.shutdown_background();
        } else {
            if let Err(e) = closed.wait() {
                debug!("Close on drop failed: {}", e);
            }
            // waits for any blocking work still running
            drop(runtime);
        }
    }
}

fn run_classification(
    session: &Mutex<InferenceSession>,
    preprocessor: &ImagePreprocessor,
    image: &RasterImage,
) -> Result<ClassificationResult> {
    let (shape, packer) = {
        let session = session.lock();
        let ready = session.ready()?;
        (ready.shape(), *ready.packer())
    };

    let start = Instant::now();
    let tensor = preprocessor.prepare(image, &shape, &packer)?;
    debug!(
        "Preprocessing time = {:.1}ms",
        start.elapsed().as_secs_f32() * 1000.0
    );

    let start = Instant::now();
    let scores = session.lock().classify(&tensor)?;
    debug!(
        "Inference time = {:.1}ms",
        start.elapsed().as_secs_f32() * 1000.0
    );

    Ok(decode_scores(&scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_stub::StubLoader;

    fn pipeline() -> ClassificationPipeline {
        ClassificationPipeline::with_loader(
            ClassifierConfig::default(),
            Arc::new(StubLoader::new(vec![1, 28, 28, 1])),
        )
        .unwrap()
        .with_resource(ModelResource::from_bytes("mnist", vec![1u8; 8]))
    }

    #[tokio::test]
    async fn test_in_flight_tracking() {
        let tracker = Arc::new(InFlight::default());
        let a = tracker.enter();
        let b = tracker.enter();
        assert_eq!(tracker.pending(), 2);

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.idle().await })
        };
        drop(a);
        assert_eq!(tracker.pending(), 1);
        drop(b);
        waiter.await.unwrap();
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn test_initialize_reports_shape() {
        let pipeline = pipeline();
        let shape = pipeline.initialize().wait().unwrap();
        assert_eq!(shape, ModelShape::new(28, 28));
        assert!(pipeline.is_initialized());
        assert_eq!(pipeline.model_shape(), Some(shape));
    }

    #[test]
    fn test_preprocess_needs_model() {
        let pipeline = pipeline();
        let image = RasterImage::filled(100, 100, [255, 255, 255, 255]);
        assert!(matches!(
            pipeline.preprocess(&image),
            Err(ClassifierError::NotInitialized)
        ));

        pipeline.initialize().wait().unwrap();
        let pixels = pipeline.preprocess(&image).unwrap();
        assert_eq!(pixels.len(), 784);
    }

    #[test]
    fn test_panicking_work_reported() {
        let pipeline = pipeline();
        let handle = pipeline.dispatch::<(), _>("explode", || panic!("kaboom"));
        match handle.wait() {
            Err(ClassifierError::WorkerPanic { task, message }) => {
                assert_eq!(task, "explode");
                assert_eq!(message, "kaboom");
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_requests_after_close_fail() {
        let pipeline = pipeline();
        pipeline.initialize().wait().unwrap();
        pipeline.close().wait().unwrap();
        assert_eq!(pipeline.status(), SessionStatus::Closed);

        let image = RasterImage::filled(28, 28, [0, 0, 0, 255]);
        assert!(matches!(
            pipeline.classify(image),
            Err(ClassifierError::SessionClosed)
        ));
        assert!(matches!(
            pipeline.initialize().wait(),
            Err(ClassifierError::SessionClosed)
        ));
        pipeline.close().wait().unwrap();
    }
}
