use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::widgets::ListState;

use crate::rotator::{RotateMsg, Trigger};
use crate::source::Post;

/// Something the main loop has to carry out on the app's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Rotate,
    Reapply,
    SetPaused(bool),
    /// Drop the `--environment` override and detect again.
    Redetect,
    /// Open these pages or files with the default handler.
    Open(Vec<String>),
}

pub struct App {
    /// Posts of the wallpapers currently set, in monitor order.
    pub posts: Vec<Post>,
    /// Downloaded files, aligned with `posts`.
    pub files: Vec<PathBuf>,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last rotation status message.
    pub status: String,
    /// Whether the status describes a failure.
    pub status_is_error: bool,
    pub source: String,
    /// Environment key of the last completed cycle.
    pub environment: Option<String>,
    pub monitors: usize,
    pub busy: bool,
    pub paused: bool,
    pub interval: Duration,
    pub next_rotation: Option<Instant>,
    pub rotations: u32,
    pub failures: u32,
    /// Where this session logs, when it logs to a file.
    pub log_file: Option<PathBuf>,
    requests: Vec<Request>,
}

impl App {
    pub fn new(source: &str, interval: Duration, paused: bool) -> Self {
        Self {
            posts: Vec::new(),
            files: Vec::new(),
            list_state: ListState::default(),
            quit: false,
            status: "Starting…".into(),
            status_is_error: false,
            source: source.to_string(),
            environment: None,
            monitors: 0,
            busy: false,
            paused,
            interval,
            next_rotation: None,
            rotations: 0,
            failures: 0,
            log_file: None,
            requests: Vec::new(),
        }
    }

    /// Fold one message from the rotator into the state.
    pub fn handle_msg(&mut self, msg: RotateMsg) {
        match msg {
            RotateMsg::Started(trigger) => {
                self.busy = true;
                self.set_status(format!("Rotating ({})…", trigger.label()), false);
            }
            RotateMsg::Rotated { trigger, report } => {
                self.busy = false;
                self.environment = Some(report.environment);
                self.monitors = report.monitors.len();
                if report.fetched.is_empty() {
                    self.set_status("Nothing fetched, wallpaper unchanged".into(), false);
                    return;
                }
                if trigger != Trigger::Reapply {
                    self.rotations += 1;
                }
                let count = report.fetched.posts.len();
                self.posts = report.fetched.posts;
                self.files = report.fetched.files;
                self.list_state.select(Some(0));
                self.set_status(
                    format!("Set {count} wallpaper(s) in {:.1}s", report.elapsed.as_secs_f32()),
                    false,
                );
            }
            RotateMsg::Failed { kind, message, .. } => {
                self.busy = false;
                self.failures += 1;
                self.set_status(format!("{kind} error: {message}"), true);
            }
            RotateMsg::Schedule { next, interval } => {
                self.next_rotation = next;
                self.interval = interval;
                self.paused = next.is_none();
            }
        }
    }

    fn set_status(&mut self, status: String, is_error: bool) {
        self.status = status;
        self.status_is_error = is_error;
    }

    /// Time left until the timer fires, `None` while paused.
    pub fn countdown(&self, now: Instant) -> Option<Duration> {
        self.next_rotation.map(|next| next.saturating_duration_since(now))
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.list_state.selected().and_then(|i| self.posts.get(i))
    }

    // -- requests ------------------------------------------------------------

    pub fn request_rotate(&mut self) {
        if self.busy {
            self.set_status("Already rotating…".into(), false);
        }
        self.requests.push(Request::Rotate);
    }

    pub fn request_reapply(&mut self) {
        if self.files.is_empty() {
            self.set_status("Nothing to re-apply yet".into(), true);
            return;
        }
        self.requests.push(Request::Reapply);
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.requests.push(Request::SetPaused(self.paused));
    }

    pub fn request_redetect(&mut self) {
        self.set_status("Environment will be detected on the next cycle".into(), false);
        self.requests.push(Request::Redetect);
    }

    pub fn open_selected(&mut self) {
        if let Some(url) = self.selected_post().map(|p| p.show_url.clone()) {
            self.requests.push(Request::Open(vec![url]));
        }
    }

    pub fn open_all(&mut self) {
        if !self.posts.is_empty() {
            let urls = self.posts.iter().map(|p| p.show_url.clone()).collect();
            self.requests.push(Request::Open(urls));
        }
    }

    pub fn open_log(&mut self) {
        match &self.log_file {
            Some(path) => {
                let target = path.display().to_string();
                self.requests.push(Request::Open(vec![target]));
            }
            None => self.set_status("Not logging to a file".into(), true),
        }
    }

    /// Hand pending requests to the main loop.
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        if self.posts.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.posts.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.posts.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.posts.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.posts.is_empty() {
            self.list_state.select(Some(self.posts.len() - 1));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dispatch::CycleReport;
    use crate::monitor::Monitor;
    use crate::source::post::tests::make_post;
    use crate::source::FetchResult;

    pub fn report(ids: &[u64]) -> CycleReport {
        CycleReport {
            environment: "sway".into(),
            monitors: vec![
                Monitor::new("eDP-1", 0, 0, 1920, 1080),
                Monitor::new("DP-3", 1920, 0, 3840, 2160),
            ],
            fetched: FetchResult {
                files: ids
                    .iter()
                    .map(|id| PathBuf::from(format!("/tmp/konawall-{id}.jpg")))
                    .collect(),
                posts: ids
                    .iter()
                    .map(|id| make_post(*id, &format!("https://x/{id}.jpg")))
                    .collect(),
            },
            elapsed: Duration::from_millis(1500),
        }
    }

    pub fn rotated_app(ids: &[u64]) -> App {
        let mut app = App::new("konachan", Duration::from_secs(600), false);
        app.handle_msg(RotateMsg::Rotated {
            trigger: Trigger::Startup,
            report: report(ids),
        });
        app
    }

    // -- construction --------------------------------------------------------

    #[test]
    fn new_app_starts_empty() {
        let app = App::new("konachan", Duration::from_secs(600), true);
        assert!(app.posts.is_empty());
        assert!(!app.quit);
        assert!(app.paused);
        assert!(app.list_state.selected().is_none());
    }

    // -- rotator messages ----------------------------------------------------

    #[test]
    fn rotated_replaces_posts_and_selects_first() {
        let mut app = rotated_app(&[1, 2]);
        assert!(!app.busy);
        assert_eq!(app.posts.len(), 2);
        assert_eq!(app.files.len(), 2);
        assert_eq!(app.environment.as_deref(), Some("sway"));
        assert_eq!(app.monitors, 2);
        assert_eq!(app.list_state.selected(), Some(0));
        assert_eq!(app.rotations, 1);

        app.handle_msg(RotateMsg::Rotated {
            trigger: Trigger::Timer,
            report: report(&[7]),
        });
        assert_eq!(app.posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![7]);
        assert_eq!(app.rotations, 2);
    }

    #[test]
    fn empty_cycle_keeps_current_posts() {
        let mut app = rotated_app(&[1]);
        app.handle_msg(RotateMsg::Rotated {
            trigger: Trigger::Manual,
            report: report(&[]),
        });
        assert_eq!(app.posts.len(), 1);
        assert!(app.status.contains("unchanged"));
    }

    #[test]
    fn failure_keeps_posts_and_flags_status() {
        let mut app = rotated_app(&[1]);
        app.handle_msg(RotateMsg::Started(Trigger::Timer));
        assert!(app.busy);
        app.handle_msg(RotateMsg::Failed {
            trigger: Trigger::Timer,
            kind: "network",
            message: "request failed with status code 503".into(),
        });
        assert!(!app.busy);
        assert!(app.status_is_error);
        assert!(app.status.starts_with("network error"));
        assert_eq!(app.posts.len(), 1);
        assert_eq!(app.failures, 1);
    }

    #[test]
    fn schedule_updates_countdown_and_pause() {
        let mut app = App::new("konachan", Duration::from_secs(600), false);
        let now = Instant::now();
        app.handle_msg(RotateMsg::Schedule {
            next: Some(now + Duration::from_secs(90)),
            interval: Duration::from_secs(120),
        });
        assert_eq!(app.countdown(now), Some(Duration::from_secs(90)));
        assert_eq!(app.interval, Duration::from_secs(120));

        app.handle_msg(RotateMsg::Schedule {
            next: None,
            interval: Duration::from_secs(120),
        });
        assert!(app.paused);
        assert_eq!(app.countdown(now), None);
    }

    // -- requests ------------------------------------------------------------

    #[test]
    fn requests_are_queued_and_drained() {
        let mut app = rotated_app(&[1, 2]);
        app.request_rotate();
        app.toggle_pause();
        app.request_reapply();
        app.select_last();
        app.open_selected();

        assert_eq!(
            app.take_requests(),
            vec![
                Request::Rotate,
                Request::SetPaused(true),
                Request::Reapply,
                Request::Open(vec!["https://example.com/post/show/2".into()]),
            ]
        );
        assert!(app.take_requests().is_empty());
    }

    #[test]
    fn reapply_needs_something_to_apply() {
        let mut app = App::new("konachan", Duration::from_secs(600), false);
        app.request_reapply();
        assert!(app.take_requests().is_empty());
        assert!(app.status_is_error);
    }

    #[test]
    fn redetect_is_queued() {
        let mut app = rotated_app(&[1]);
        app.request_redetect();
        assert_eq!(app.take_requests(), vec![Request::Redetect]);
    }

    #[test]
    fn open_log_needs_a_log_file() {
        let mut app = App::new("konachan", Duration::from_secs(600), false);
        app.open_log();
        assert!(app.take_requests().is_empty());
        assert!(app.status_is_error);

        app.log_file = Some(PathBuf::from("/tmp/konawall/konawall.log"));
        app.open_log();
        assert_eq!(
            app.take_requests(),
            vec![Request::Open(vec!["/tmp/konawall/konawall.log".into()])]
        );
    }

    #[test]
    fn open_all_collects_every_page() {
        let mut app = rotated_app(&[3, 4]);
        app.open_all();
        assert_eq!(
            app.take_requests(),
            vec![Request::Open(vec![
                "https://example.com/post/show/3".into(),
                "https://example.com/post/show/4".into(),
            ])]
        );
    }

    // -- navigation ----------------------------------------------------------

    #[test]
    fn navigation_on_empty_is_noop() {
        let mut app = App::new("konachan", Duration::from_secs(600), false);
        app.select_next();
        app.select_previous();
        app.select_first();
        app.select_last();
        assert!(app.list_state.selected().is_none());
        assert!(app.selected_post().is_none());
    }

    #[test]
    fn navigation_clamps_at_both_ends() {
        let mut app = rotated_app(&[1, 2, 3]);
        app.select_previous();
        assert_eq!(app.list_state.selected(), Some(0));
        app.select_next();
        app.select_next();
        app.select_next();
        assert_eq!(app.list_state.selected(), Some(2));
        assert_eq!(app.selected_post().map(|p| p.id), Some(3));
        app.select_first();
        assert_eq!(app.list_state.selected(), Some(0));
    }
}
