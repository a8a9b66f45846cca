//! One rotation cycle: detect → resolve source → fetch → resolve
//! environment → apply.
//!
//! The [`Dispatcher`] owns both registries and the cycle settings. It is
//! shared by reference between the scheduler thread and anyone asking for a
//! manual rotation, so every method takes `&self`; at most one cycle runs at
//! a time and a cycle that would overlap another is skipped.
//!
//! ## For contributors
//!
//! Every failure is scoped to the cycle that produced it. Do not store an
//! error anywhere that would prevent the next cycle from running.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::environment::{detect, EnvironmentRegistry, EnvironmentStrategy};
use crate::error::{Result, WallError};
use crate::monitor::{DisplayProbe, Monitor};
use crate::source::{checked_count, FetchResult, SourceConfig, SourceRegistry};

/// Everything a cycle needs besides the registries.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub source: String,
    /// Bypasses detection when set.
    pub environment: Option<String>,
    /// `None` means one image per monitor.
    pub count: Option<i64>,
    pub tags: Vec<String>,
    pub source_config: SourceConfig,
}

/// Builds the display probe for an environment key.
pub type ProbeFactory = Box<dyn Fn(&str) -> Box<dyn DisplayProbe> + Send + Sync>;

type Detector = Box<dyn Fn() -> Result<String> + Send + Sync>;

/// What a completed cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub environment: String,
    pub monitors: Vec<Monitor>,
    pub fetched: FetchResult,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already running; nothing happened.
    Skipped,
}

pub struct Dispatcher {
    sources: SourceRegistry,
    environments: EnvironmentRegistry,
    probe: ProbeFactory,
    detector: Detector,
    config: Mutex<CycleConfig>,
    in_flight: AtomicBool,
    /// Environment keys whose `init` already ran.
    initialized: Mutex<HashSet<String>>,
    last_fetch: Mutex<Option<FetchResult>>,
}

/// Clears the in-flight flag however the cycle ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Dispatcher {
    pub fn new(
        sources: SourceRegistry,
        environments: EnvironmentRegistry,
        probe: ProbeFactory,
        config: CycleConfig,
    ) -> Self {
        Self {
            sources,
            environments,
            probe,
            detector: Box::new(detect::detect),
            config: Mutex::new(config),
            in_flight: AtomicBool::new(false),
            initialized: Mutex::new(HashSet::new()),
            last_fetch: Mutex::new(None),
        }
    }

    /// Replace environment detection, e.g. with a fixed answer.
    pub fn with_detector(
        mut self,
        detector: impl Fn() -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn config(&self) -> CycleConfig {
        self.config.lock().clone()
    }

    /// Set or clear the environment override used by later cycles.
    pub fn set_environment(&self, environment: Option<String>) {
        self.config.lock().environment = environment;
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn environments(&self) -> &EnvironmentRegistry {
        &self.environments
    }

    pub fn last_fetch(&self) -> Option<FetchResult> {
        self.last_fetch.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one full cycle, unless one is already running.
    pub fn rotate(&self) -> Result<CycleOutcome> {
        let Some(_guard) = self.try_begin() else {
            debug!("rotation already in flight, skipping");
            return Ok(CycleOutcome::Skipped);
        };
        let started = Instant::now();
        let config = self.config();

        let environment = self.resolve_environment_key(&config)?;
        let source = self
            .sources
            .get(&config.source)
            .ok_or_else(|| WallError::UnknownSource(config.source.clone()))?;
        let monitors = (self.probe)(&environment).monitors()?;
        let count = match config.count {
            Some(raw) => checked_count(raw)?,
            None => monitors.len(),
        };
        info!(
            source = %config.source,
            %environment,
            count,
            monitors = monitors.len(),
            "rotating wallpapers"
        );

        let fetched = source.fetch(count, &config.tags, &config.source_config)?;
        if fetched.is_empty() {
            info!("nothing fetched, leaving the wallpaper alone");
            return Ok(CycleOutcome::Completed(CycleReport {
                environment,
                monitors,
                fetched,
                elapsed: started.elapsed(),
            }));
        }
        *self.last_fetch.lock() = Some(fetched.clone());

        self.apply(&environment, &fetched, &monitors)?;
        Ok(CycleOutcome::Completed(CycleReport {
            environment,
            monitors,
            fetched,
            elapsed: started.elapsed(),
        }))
    }

    /// Apply the last fetched images again without fetching.
    pub fn reapply(&self) -> Result<CycleOutcome> {
        let Some(_guard) = self.try_begin() else {
            return Ok(CycleOutcome::Skipped);
        };
        let started = Instant::now();
        let Some(fetched) = self.last_fetch() else {
            return Err(WallError::InvalidArgument("nothing has been fetched yet".into()));
        };
        let environment = self.resolve_environment_key(&self.config())?;
        let monitors = (self.probe)(&environment).monitors()?;

        self.apply(&environment, &fetched, &monitors)?;
        Ok(CycleOutcome::Completed(CycleReport {
            environment,
            monitors,
            fetched,
            elapsed: started.elapsed(),
        }))
    }

    fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.in_flight))
    }

    fn resolve_environment_key(&self, config: &CycleConfig) -> Result<String> {
        match &config.environment {
            Some(key) => {
                debug!(%key, "using environment override");
                Ok(key.clone())
            }
            None => (self.detector)(),
        }
    }

    fn resolve_environment(&self, key: &str) -> Result<&dyn EnvironmentStrategy> {
        self.environments
            .get(key)
            .ok_or_else(|| {
                WallError::UnsupportedPlatform(format!("no wallpaper handler for `{key}`"))
            })
    }

    fn apply(&self, environment: &str, fetched: &FetchResult, monitors: &[Monitor]) -> Result<()> {
        let strategy = self.resolve_environment(environment)?;
        self.ensure_initialized(environment, strategy)?;
        if fetched.files.len() != monitors.len() {
            warn!(
                files = fetched.files.len(),
                monitors = monitors.len(),
                addressing = strategy.addressing().label(),
                "image count does not match monitor count"
            );
        }
        strategy.apply(&fetched.files, monitors)?;
        info!(%environment, images = fetched.files.len(), "wallpapers set");
        Ok(())
    }

    /// `init` runs once per key; a failed `init` is retried next cycle.
    fn ensure_initialized(&self, key: &str, strategy: &dyn EnvironmentStrategy) -> Result<()> {
        if self.initialized.lock().contains(key) {
            return Ok(());
        }
        strategy.init()?;
        self.initialized.lock().insert(key.to_string());
        debug!(%key, "environment initialised");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{mpsc, Arc};
    use std::thread;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::command::testing::RecordingRunner;
    use crate::command::CommandRunner;
    use crate::environment::{self, Addressing, Toolbox};
    use crate::monitor::FixedProbe;
    use crate::source::post::tests::make_post;
    use crate::source::SourceStrategy;

    /// Writes `count` solid 1920x1080 images; counts its calls.
    pub struct ImageSource {
        dir: PathBuf,
        pub calls: AtomicUsize,
    }

    impl ImageSource {
        pub fn new(dir: &Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SourceStrategy for ImageSource {
        fn fetch(
            &self,
            count: usize,
            _tags: &[String],
            _config: &SourceConfig,
        ) -> Result<FetchResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut result = FetchResult::default();
            for i in 0..count {
                let path = self.dir.join(format!("fetch{call}-{i}.png"));
                RgbImage::from_pixel(1920, 1080, Rgb([i as u8 * 60, 0, 0]))
                    .save_with_format(&path, ImageFormat::Png)
                    .unwrap();
                result.posts.push(make_post(i as u64, &format!("https://example.com/{i}.png")));
                result.files.push(path);
            }
            Ok(result)
        }
    }

    struct FailingSource;

    impl SourceStrategy for FailingSource {
        fn fetch(
            &self,
            _count: usize,
            _tags: &[String],
            _config: &SourceConfig,
        ) -> Result<FetchResult> {
            Err(WallError::RequestFailed {
                status: 503,
                url: "https://example.com/post.json".into(),
            })
        }
    }

    /// Blocks inside `fetch` until released.
    struct GateSource {
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SourceStrategy for GateSource {
        fn fetch(
            &self,
            _count: usize,
            _tags: &[String],
            _config: &SourceConfig,
        ) -> Result<FetchResult> {
            if let Some(tx) = self.entered.lock().take() {
                tx.send(()).unwrap();
            }
            self.release.lock().recv().unwrap();
            Ok(FetchResult::default())
        }
    }

    /// Counts applies; fails while `fail` is set.
    #[derive(Default)]
    struct CountingEnvironment {
        inits: AtomicUsize,
        applies: AtomicUsize,
        fail: AtomicBool,
    }

    impl EnvironmentStrategy for Arc<CountingEnvironment> {
        fn init(&self) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn apply(&self, _files: &[PathBuf], _displays: &[Monitor]) -> Result<()> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(WallError::CommandFailed {
                    program: "fake".into(),
                    status: "exit status: 1".into(),
                });
            }
            Ok(())
        }

        fn addressing(&self) -> Addressing {
            Addressing::ByIndex
        }
    }

    pub fn dual_monitors() -> Vec<Monitor> {
        vec![
            Monitor::new("left", 0, 0, 1920, 1080),
            Monitor::new("right", 1920, 0, 1920, 1080),
        ]
    }

    pub fn fixed_probe(monitors: Vec<Monitor>) -> ProbeFactory {
        Box::new(move |_: &str| Box::new(FixedProbe(monitors.clone())) as Box<dyn DisplayProbe>)
    }

    pub fn cycle_config(source: &str, environment: Option<&str>) -> CycleConfig {
        CycleConfig {
            source: source.to_string(),
            environment: environment.map(String::from),
            count: None,
            tags: vec!["rating:s".to_string()],
            source_config: SourceConfig::new(),
        }
    }

    fn with_counting(
        source: Box<dyn SourceStrategy>,
        env: &Arc<CountingEnvironment>,
        config: CycleConfig,
    ) -> Dispatcher {
        let mut sources = SourceRegistry::new("source");
        sources.register("test", source);
        let mut environments = EnvironmentRegistry::new("environment");
        environments.register("fake", Box::new(Arc::clone(env)));
        Dispatcher::new(sources, environments, fixed_probe(dual_monitors()), config)
    }

    fn completed(outcome: CycleOutcome) -> CycleReport {
        match outcome {
            CycleOutcome::Completed(report) => report,
            CycleOutcome::Skipped => panic!("cycle was skipped"),
        }
    }

    #[test]
    fn dual_monitor_canvas_cycle_composes_once_and_runs_one_command() {
        let dir = tempfile::tempdir().unwrap();
        let canvas_dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());

        let mut sources = SourceRegistry::new("source");
        sources.register("test", Box::new(ImageSource::new(dir.path())));
        let mut environments = EnvironmentRegistry::new("environment");
        environment::register_all(
            &mut environments,
            &Toolbox {
                runner: Arc::clone(&runner) as Arc<dyn CommandRunner>,
                canvas_dir: canvas_dir.path().to_path_buf(),
            },
        );
        let mut config = cycle_config("test", Some("lxde"));
        config.count = Some(2);
        let dispatcher =
            Dispatcher::new(sources, environments, fixed_probe(dual_monitors()), config);

        let report = completed(dispatcher.rotate().unwrap());

        assert_eq!(report.environment, "lxde");
        assert_eq!(report.fetched.files.len(), 2);
        let composites: Vec<_> = std::fs::read_dir(canvas_dir.path()).unwrap().collect();
        assert_eq!(composites.len(), 1, "exactly one composite image");
        let composite = composites[0].as_ref().unwrap().path();
        assert_eq!(image::image_dimensions(&composite).unwrap(), (3840, 1080));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1, "exactly one apply command");
        assert_eq!(calls[0][0], "pcmanfm");
        assert_eq!(PathBuf::from(&calls[0][2]), composite);
    }

    #[test]
    fn short_fetch_still_sets_a_spanning_wallpaper() {
        let dir = tempfile::tempdir().unwrap();
        let canvas_dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());

        let mut sources = SourceRegistry::new("source");
        sources.register("test", Box::new(ImageSource::new(dir.path())));
        let mut environments = EnvironmentRegistry::new("environment");
        environment::register_all(
            &mut environments,
            &Toolbox {
                runner: Arc::clone(&runner) as Arc<dyn CommandRunner>,
                canvas_dir: canvas_dir.path().to_path_buf(),
            },
        );
        // The board matched fewer posts than there are monitors.
        let mut config = cycle_config("test", Some("gnome"));
        config.count = Some(1);
        let dispatcher =
            Dispatcher::new(sources, environments, fixed_probe(dual_monitors()), config);

        let report = completed(dispatcher.rotate().unwrap());

        assert_eq!(report.fetched.files.len(), 1);
        let composites: Vec<_> = std::fs::read_dir(canvas_dir.path()).unwrap().collect();
        assert_eq!(composites.len(), 1);
        let composite = composites[0].as_ref().unwrap().path();
        assert_eq!(image::image_dimensions(&composite).unwrap(), (3840, 1080));
        assert!(runner
            .calls_to("gsettings")
            .iter()
            .any(|call| call.iter().any(|a| a == "picture-uri")));
    }

    #[test]
    fn count_defaults_to_monitor_count() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        let dispatcher = with_counting(
            Box::new(ImageSource::new(dir.path())),
            &env,
            cycle_config("test", Some("fake")),
        );

        let report = completed(dispatcher.rotate().unwrap());
        assert_eq!(report.fetched.files.len(), 2);
        assert_eq!(report.monitors.len(), 2);
    }

    #[test]
    fn negative_count_is_rejected_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        let mut config = cycle_config("test", Some("fake"));
        config.count = Some(-1);
        let dispatcher = with_counting(Box::new(ImageSource::new(dir.path())), &env, config);

        assert!(matches!(dispatcher.rotate(), Err(WallError::InvalidArgument(_))));
        assert_eq!(env.applies.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_count_fetches_nothing_and_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        let mut config = cycle_config("test", Some("fake"));
        config.count = Some(0);
        let dispatcher = with_counting(Box::new(ImageSource::new(dir.path())), &env, config);

        let report = completed(dispatcher.rotate().unwrap());
        assert!(report.fetched.is_empty());
        assert_eq!(env.applies.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_source_fails_the_cycle_only() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        let dispatcher = with_counting(
            Box::new(ImageSource::new(dir.path())),
            &env,
            cycle_config("nope", Some("fake")),
        );

        assert!(matches!(dispatcher.rotate(), Err(WallError::UnknownSource(s)) if s == "nope"));
        assert!(!dispatcher.is_busy());
    }

    #[test]
    fn unregistered_environment_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        let dispatcher = with_counting(
            Box::new(ImageSource::new(dir.path())),
            &env,
            cycle_config("test", Some("enlightenment")),
        );
        assert!(matches!(dispatcher.rotate(), Err(WallError::UnsupportedPlatform(_))));
    }

    #[test]
    fn detection_failure_then_override_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        let dispatcher = with_counting(
            Box::new(ImageSource::new(dir.path())),
            &env,
            cycle_config("test", None),
        )
        .with_detector(|| Err(WallError::UnsupportedPlatform("no session".into())));

        assert!(matches!(dispatcher.rotate(), Err(WallError::UnsupportedPlatform(_))));
        assert_eq!(env.applies.load(Ordering::SeqCst), 0);

        dispatcher.set_environment(Some("fake".into()));
        completed(dispatcher.rotate().unwrap());
        assert_eq!(env.applies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fetch_failure_applies_nothing() {
        let env = Arc::new(CountingEnvironment::default());
        let dispatcher =
            with_counting(Box::new(FailingSource), &env, cycle_config("test", Some("fake")));
        assert!(matches!(dispatcher.rotate(), Err(WallError::RequestFailed { status: 503, .. })));
        assert_eq!(env.applies.load(Ordering::SeqCst), 0);
        assert!(dispatcher.last_fetch().is_none());
    }

    #[test]
    fn failed_apply_can_be_retried_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(CountingEnvironment::default());
        env.fail.store(true, Ordering::SeqCst);
        let source = Arc::new(ImageSource::new(dir.path()));

        struct Shared(Arc<ImageSource>);
        impl SourceStrategy for Shared {
            fn fetch(
                &self,
                count: usize,
                tags: &[String],
                config: &SourceConfig,
            ) -> Result<FetchResult> {
                self.0.fetch(count, tags, config)
            }
        }

        let dispatcher = with_counting(
            Box::new(Shared(Arc::clone(&source))),
            &env,
            cycle_config("test", Some("fake")),
        );

        assert!(matches!(dispatcher.rotate(), Err(WallError::CommandFailed { .. })));
        let kept = dispatcher.last_fetch().unwrap();
        assert!(kept.files.iter().all(|f| f.exists()), "fetched files survive a failed apply");

        env.fail.store(false, Ordering::SeqCst);
        let report = completed(dispatcher.reapply().unwrap());

        assert_eq!(report.fetched, kept);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1, "no second fetch");
        assert_eq!(env.applies.load(Ordering::SeqCst), 2);
        assert_eq!(env.inits.load(Ordering::SeqCst), 1, "init runs once per key");
    }

    #[test]
    fn reapply_before_any_fetch_is_an_error() {
        let env = Arc::new(CountingEnvironment::default());
        let dispatcher =
            with_counting(Box::new(FailingSource), &env, cycle_config("test", Some("fake")));
        assert!(matches!(dispatcher.reapply(), Err(WallError::InvalidArgument(_))));
    }

    #[test]
    fn overlapping_cycle_is_skipped() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let env = Arc::new(CountingEnvironment::default());
        let source = GateSource {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        let dispatcher = Arc::new(with_counting(
            Box::new(source),
            &env,
            cycle_config("test", Some("fake")),
        ));

        let first = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.rotate())
        };
        entered_rx.recv().unwrap();

        assert!(dispatcher.is_busy());
        assert!(matches!(dispatcher.rotate().unwrap(), CycleOutcome::Skipped));
        assert!(matches!(dispatcher.reapply().unwrap(), CycleOutcome::Skipped));

        release_tx.send(()).unwrap();
        completed(first.join().unwrap().unwrap());
        assert!(!dispatcher.is_busy());
    }
}
