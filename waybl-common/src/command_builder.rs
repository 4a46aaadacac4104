use std::path::{Path, PathBuf};

use crate::executor::ExternalCommand;
use crate::scene::Resolution;
use crate::settings::BlurSettings;

const FILL_MODE: &str = "fill";
const FALLBACK_COLOR: &str = "#000000";

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    convert_path: PathBuf,
    swaymsg_path: PathBuf,
}

impl CommandBuilder {
    pub fn new(convert_path: PathBuf, swaymsg_path: PathBuf) -> Self {
        Self {
            convert_path,
            swaymsg_path,
        }
    }

    /// Resolves the external programs from PATH, falling back to bare names.
    pub fn discover() -> Self {
        let convert_path = which::which("convert")
            .or_else(|_| which::which("magick"))
            .unwrap_or_else(|_| {
                log::warn!("Neither convert nor magick found in PATH, blurred wallpapers will fail");
                PathBuf::from("convert")
            });
        let swaymsg_path = which::which("swaymsg").unwrap_or_else(|_| {
            log::warn!("swaymsg not found in PATH, wallpapers cannot be set");
            PathBuf::from("swaymsg")
        });

        log::debug!("Using {:?} and {:?}", convert_path, swaymsg_path);
        Self::new(convert_path, swaymsg_path)
    }

    /// Crop to the output, shrink, blur, then scale back up.
    pub fn build_blur_command(
        &self,
        source: &Path,
        destination: &Path,
        resolution: Resolution,
        blur: &BlurSettings,
    ) -> ExternalCommand {
        ExternalCommand::new(&self.convert_path)
            .arg(source.to_string_lossy())
            .args(["-geometry".to_string(), format!("{}^", resolution)])
            .args(["-gravity", "center"])
            .args(["-crop".to_string(), format!("{}+0+0", resolution)])
            .args(["-resize", "5%"])
            .args(["-blur", blur.radius()])
            .args(["-resize", "1000%"])
            .arg(destination.to_string_lossy())
    }

    pub fn build_bg_command(&self, output: &str, image: &Path) -> ExternalCommand {
        ExternalCommand::new(&self.swaymsg_path)
            .args(["output", output, "bg"])
            .arg(quote(&image.to_string_lossy()))
            .args([FILL_MODE, FALLBACK_COLOR])
    }
}

// swaymsg joins its arguments into one sway command, so paths need quoting.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CommandBuilder {
        CommandBuilder::new(PathBuf::from("/usr/bin/convert"), PathBuf::from("/usr/bin/swaymsg"))
    }

    #[test]
    fn test_blur_command_uses_output_resolution() {
        let command = builder().build_blur_command(
            Path::new("/walls/forest.png"),
            Path::new("/home/me/.waybl/DP-1.jpg"),
            Resolution {
                width: 2560,
                height: 1440,
            },
            &"0x4".parse().unwrap(),
        );

        assert_eq!(command.program, PathBuf::from("/usr/bin/convert"));
        assert_eq!(
            command.args,
            vec![
                "/walls/forest.png",
                "-geometry",
                "2560x1440^",
                "-gravity",
                "center",
                "-crop",
                "2560x1440+0+0",
                "-resize",
                "5%",
                "-blur",
                "0x4",
                "-resize",
                "1000%",
                "/home/me/.waybl/DP-1.jpg",
            ]
        );
    }

    #[test]
    fn test_bg_command() {
        let command = builder().build_bg_command("HDMI-A-1", Path::new("/walls/my forest.png"));

        assert_eq!(command.program, PathBuf::from("/usr/bin/swaymsg"));
        assert_eq!(
            command.args,
            vec!["output", "HDMI-A-1", "bg", "\"/walls/my forest.png\"", "fill", "#000000"]
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"/a "b"\c"#), r#""/a \"b\"\\c""#);
    }
}
