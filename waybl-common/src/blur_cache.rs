use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command_builder::CommandBuilder;
use crate::error::{BlurError, WayblError};
use crate::executor::CommandRunner;
use crate::scene::Resolution;
use crate::settings::BlurSettings;
use crate::Result;

/// One blurred derivative per output, kept in a cache directory.
pub struct BlurCache<R> {
    dir: PathBuf,
    blur: BlurSettings,
    builder: CommandBuilder,
    runner: Arc<R>,
}

impl<R: CommandRunner> BlurCache<R> {
    pub fn new(dir: PathBuf, blur: BlurSettings, builder: CommandBuilder, runner: Arc<R>) -> Self {
        Self {
            dir,
            blur,
            builder,
            runner,
        }
    }

    pub fn path_for(&self, output: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", output))
    }

    fn partial_path_for(&self, output: &str) -> PathBuf {
        self.dir.join(format!("{}.partial.jpg", output))
    }

    /// Returns the cached blurred image for `output`, rendering it first when
    /// `force` is set, or the file is missing or older than `source`.
    pub async fn ensure_blurred(
        &self,
        output: &str,
        source: &Path,
        resolution: Resolution,
        force: bool,
    ) -> Result<PathBuf> {
        if !source.is_file() {
            return Err(WayblError::Blur(BlurError::SourceMissing {
                path: source.to_path_buf(),
            }));
        }

        let destination = self.path_for(output);
        if !force && is_fresh(&destination, source) {
            log::debug!("Reusing blurred wallpaper for {}: {:?}", output, destination);
            return Ok(destination);
        }

        self.render(output, source, resolution).await?;
        Ok(destination)
    }

    async fn render(&self, output: &str, source: &Path, resolution: Resolution) -> Result<()> {
        let destination = self.path_for(output);
        let partial = self.partial_path_for(output);
        log::info!(
            "Generating blurred wallpaper for {} ({}, blur {}): {:?}",
            output,
            resolution,
            self.blur,
            destination
        );

        let command = self
            .builder
            .build_blur_command(source, &partial, resolution, &self.blur);

        if let Err(e) = self.runner.run(command).await {
            let _ = fs::remove_file(&partial);
            return Err(match e {
                WayblError::Process(source) => WayblError::Blur(BlurError::Render {
                    output: output.to_string(),
                    source,
                }),
                other => other,
            });
        }

        fs::rename(&partial, &destination).map_err(|e| {
            let _ = fs::remove_file(&partial);
            WayblError::Blur(BlurError::CacheFile {
                path: destination.clone(),
                source: e,
            })
        })?;

        log::debug!("Blurred wallpaper for {} written to {:?}", output, destination);
        Ok(())
    }
}

fn is_fresh(cached: &Path, source: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(cached), modified(source)) {
        (Some(cached), Some(source)) => cached >= source,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::executor::{CommandOutput, ExternalCommand};
    use std::future::Future;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    /// Pretends to be ImageMagick: writes the source bytes plus a render counter to the destination.
    #[derive(Default)]
    struct FakeConvert {
        calls: Mutex<Vec<ExternalCommand>>,
        fail: Mutex<bool>,
    }

    impl CommandRunner for FakeConvert {
        fn run(&self, command: ExternalCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
            let result = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(command.clone());
                if *self.fail.lock().unwrap() {
                    Err(WayblError::Process(ProcessError::NonZeroExit {
                        code: 1,
                        stderr: "convert: unable to open image".to_string(),
                    }))
                } else {
                    let source = fs::read(&command.args[0]).unwrap();
                    let mut rendered = format!("render {}:", calls.len()).into_bytes();
                    rendered.extend(source);
                    fs::write(command.args.last().unwrap(), rendered).unwrap();
                    Ok(CommandOutput::default())
                }
            };
            async move { result }
        }
    }

    fn cache(dir: &Path, runner: Arc<FakeConvert>) -> BlurCache<FakeConvert> {
        BlurCache::new(
            dir.to_path_buf(),
            BlurSettings::default(),
            CommandBuilder::new(PathBuf::from("convert"), PathBuf::from("swaymsg")),
            runner,
        )
    }

    #[tokio::test]
    async fn test_path_is_deterministic() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("wall.png");
        fs::write(&source, b"pixels").unwrap();
        let runner = Arc::new(FakeConvert::default());
        let cache = cache(temp_dir.path(), runner.clone());

        let first = cache
            .ensure_blurred("DP-1", &source, Resolution::default(), false)
            .await
            .unwrap();
        let second = cache
            .ensure_blurred("DP-1", &source, Resolution::default(), true)
            .await
            .unwrap();

        assert_eq!(first, temp_dir.path().join("DP-1.jpg"));
        assert_eq!(first, second);
        assert_eq!(first, cache.path_for("DP-1"));
        assert!(!temp_dir.path().join("DP-1.partial.jpg").exists());
    }

    #[tokio::test]
    async fn test_fresh_cache_is_reused() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("wall.png");
        fs::write(&source, b"pixels").unwrap();
        let runner = Arc::new(FakeConvert::default());
        let cache = cache(temp_dir.path(), runner.clone());

        cache
            .ensure_blurred("DP-1", &source, Resolution::default(), false)
            .await
            .unwrap();
        cache
            .ensure_blurred("DP-1", &source, Resolution::default(), false)
            .await
            .unwrap();

        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_source_overwrites() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("wall.png");
        fs::write(&source, b"old").unwrap();
        let runner = Arc::new(FakeConvert::default());
        let cache = cache(temp_dir.path(), runner.clone());

        let path = cache
            .ensure_blurred("DP-1", &source, Resolution::default(), false)
            .await
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"render 1:old");

        fs::write(&source, b"new").unwrap();
        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let again = cache
            .ensure_blurred("DP-1", &source, Resolution::default(), false)
            .await
            .unwrap();
        assert_eq!(again, path);
        assert_eq!(fs::read(&path).unwrap(), b"render 2:new");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let runner = Arc::new(FakeConvert::default());
        let cache = cache(temp_dir.path(), runner.clone());

        let result = cache
            .ensure_blurred("DP-1", &temp_dir.path().join("gone.png"), Resolution::default(), false)
            .await;

        assert!(matches!(result, Err(WayblError::Blur(BlurError::SourceMissing { .. }))));
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_render_keeps_previous_file() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("wall.png");
        fs::write(&source, b"pixels").unwrap();
        let runner = Arc::new(FakeConvert::default());
        let cache = cache(temp_dir.path(), runner.clone());

        let path = cache
            .ensure_blurred("DP-1", &source, Resolution::default(), false)
            .await
            .unwrap();

        *runner.fail.lock().unwrap() = true;
        let result = cache
            .ensure_blurred("DP-1", &source, Resolution::default(), true)
            .await;

        match result {
            Err(WayblError::Blur(BlurError::Render { output, .. })) => assert_eq!(output, "DP-1"),
            other => panic!("Expected render error, got {:?}", other),
        }
        assert_eq!(fs::read(&path).unwrap(), b"render 1:pixels");
        assert!(!temp_dir.path().join("DP-1.partial.jpg").exists());
    }
}
