use std::path::Path;
use std::sync::Arc;

use crate::command_builder::CommandBuilder;
use crate::error::{ApplyError, ErrorReporting, ProcessError, WayblError};
use crate::executor::CommandRunner;
use crate::settings::RetryPolicy;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Superseded,
}

/// Sets the wallpaper of a single output through `swaymsg`.
pub struct WallpaperApplicator<R> {
    builder: CommandBuilder,
    runner: Arc<R>,
    retry: RetryPolicy,
}

impl<R: CommandRunner> WallpaperApplicator<R> {
    pub fn new(builder: CommandBuilder, runner: Arc<R>, retry: RetryPolicy) -> Self {
        Self {
            builder,
            runner,
            retry,
        }
    }

    /// Retries a fixed number of times with a fixed delay. Exhausting the
    /// attempts fails this output only.
    pub async fn apply(&self, output: &str, image: &Path) -> Result<()> {
        self.apply_unless(output, image, || false).await.map(|_| ())
    }

    /// Like [`apply`](Self::apply), but `superseded` is consulted before every
    /// attempt and stops the retries once it returns true.
    pub async fn apply_unless<F>(&self, output: &str, image: &Path, superseded: F) -> Result<ApplyOutcome>
    where
        F: Fn() -> bool,
    {
        if !image.is_file() {
            return Err(WayblError::Apply(ApplyError::MissingImage {
                path: image.to_path_buf(),
            }));
        }

        log::info!("Setting wallpaper of {} to {:?}", output, image);
        let attempts = self.retry.attempts.max(1);

        let mut attempt = 1;
        loop {
            if superseded() {
                log::debug!("Wallpaper {:?} for {} is no longer wanted", image, output);
                return Ok(ApplyOutcome::Superseded);
            }

            let command = self.builder.build_bg_command(output, image);
            let error = match self.runner.run(command).await {
                Ok(_) => {
                    log::debug!("Wallpaper of {} set on attempt {}", output, attempt);
                    return Ok(ApplyOutcome::Applied);
                }
                Err(e) => e,
            };

            if attempt >= attempts {
                let last = match error {
                    WayblError::Process(e) => e,
                    other => ProcessError::NonZeroExit {
                        code: -1,
                        stderr: other.to_string(),
                    },
                };
                return Err(WayblError::Apply(ApplyError::Exhausted {
                    output: output.to_string(),
                    attempts,
                    last,
                }));
            }

            log::warn!(
                "Failed to set wallpaper for {} (attempt {}/{}): {}. Retrying in {:?}...",
                output,
                attempt,
                attempts,
                error.user_friendly_message(),
                self.retry.delay
            );
            tokio::time::sleep(self.retry.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CommandOutput, ExternalCommand};
    use std::future::Future;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::Instant;

    /// Fails the first `failures` invocations, then succeeds.
    struct FlakySwaymsg {
        failures: usize,
        attempts: Mutex<Vec<(Instant, ExternalCommand)>>,
    }

    impl FlakySwaymsg {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn times(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }
    }

    impl CommandRunner for FlakySwaymsg {
        fn run(&self, command: ExternalCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push((Instant::now(), command));
            let result = if attempts.len() <= self.failures {
                Err(WayblError::Process(ProcessError::NonZeroExit {
                    code: 1,
                    stderr: "Error: Unable to connect to sway IPC socket".to_string(),
                }))
            } else {
                Ok(CommandOutput::default())
            };
            async move { result }
        }
    }

    fn applicator(runner: Arc<FlakySwaymsg>) -> WallpaperApplicator<FlakySwaymsg> {
        WallpaperApplicator::new(
            CommandBuilder::new(PathBuf::from("convert"), PathBuf::from("swaymsg")),
            runner,
            RetryPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let temp_dir = tempdir().unwrap();
        let image = temp_dir.path().join("wall.png");
        std::fs::write(&image, b"pixels").unwrap();
        let runner = FlakySwaymsg::new(0);

        applicator(runner.clone()).apply("DP-1", &image).await.unwrap();

        let attempts = runner.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].1.args[0..3], ["output", "DP-1", "bg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let temp_dir = tempdir().unwrap();
        let image = temp_dir.path().join("wall.png");
        std::fs::write(&image, b"pixels").unwrap();
        let runner = FlakySwaymsg::new(2);

        applicator(runner.clone()).apply("DP-1", &image).await.unwrap();

        assert_eq!(runner.times().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_five_attempts() {
        let temp_dir = tempdir().unwrap();
        let image = temp_dir.path().join("wall.png");
        std::fs::write(&image, b"pixels").unwrap();
        let runner = FlakySwaymsg::new(usize::MAX);
        let start = Instant::now();

        let result = applicator(runner.clone()).apply("DP-1", &image).await;

        match result {
            Err(WayblError::Apply(ApplyError::Exhausted { output, attempts, .. })) => {
                assert_eq!(output, "DP-1");
                assert_eq!(attempts, 5);
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }

        let times = runner.times();
        assert_eq!(times.len(), 5);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
        // no sleep after the final attempt
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_wallpaper_stops_retrying() {
        let temp_dir = tempdir().unwrap();
        let image = temp_dir.path().join("wall.png");
        std::fs::write(&image, b"pixels").unwrap();
        let runner = FlakySwaymsg::new(usize::MAX);
        let observed = runner.clone();

        // Give up wanting this image once two attempts have failed.
        let outcome = applicator(runner.clone())
            .apply_unless("DP-1", &image, || observed.times().len() >= 2)
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Superseded);
        assert_eq!(runner.times().len(), 2);
    }

    #[tokio::test]
    async fn test_already_superseded_wallpaper_is_never_attempted() {
        let temp_dir = tempdir().unwrap();
        let image = temp_dir.path().join("wall.png");
        std::fs::write(&image, b"pixels").unwrap();
        let runner = FlakySwaymsg::new(0);

        let outcome = applicator(runner.clone())
            .apply_unless("DP-1", &image, || true)
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Superseded);
        assert!(runner.times().is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_is_never_applied() {
        let temp_dir = tempdir().unwrap();
        let runner = FlakySwaymsg::new(0);

        let result = applicator(runner.clone())
            .apply("DP-1", &temp_dir.path().join("DP-1.jpg"))
            .await;

        assert!(matches!(result, Err(WayblError::Apply(ApplyError::MissingImage { .. }))));
        assert!(runner.times().is_empty());
    }
}
