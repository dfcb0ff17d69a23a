//! Command-line grammar:
//!
//! `image-registration <moving> [-c x y w h | -g] <reference> [-c x y w h | -g] [-v]`
//!
//! `-V` and `-h` are only recognised as the sole argument.

use std::path::PathBuf;

use crate::error::{RegResult, RegistrationError};
use crate::preprocess::{CropRect, RegionSource};

/// Parsed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Help,
    Version,
    Register(RegisterArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterArgs {
    pub moving: PathBuf,
    pub moving_region: RegionSource,
    pub reference: PathBuf,
    pub reference_region: RegionSource,
    pub verbose: bool,
}

/// `image-registration version <major>.<minor>`
pub fn version_line() -> String {
    format!(
        "image-registration version {}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

/// Version line followed by the usage text
pub fn help_text() -> String {
    [
        version_line().as_str(),
        "This application performs image registration. Use the following command to launch the program:",
        "image-registration <image to register> <image options> <reference image> <image options> <general options>",
        "",
        "Images options can be of the following:",
        "-c or --crop: Crop the image with a rectangle provided as <top-left x> <top-left y> <width> <height>",
        "-g or --graphic: open a graphical interface to crop the image manually.",
        "",
        "General options can be of the following: ",
        "-v or --verbose: Verbose mode (display all operations)",
        "-V or --version: Display the version of the program.",
        "-h or --help: Print this message and close the program.",
    ]
    .join("\n")
}

/// Parse the arguments following the program name
pub fn parse_args<I, S>(args: I) -> RegResult<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();

    if let [only] = args.as_slice() {
        return match only.as_str() {
            "-V" | "--version" => Ok(CliCommand::Version),
            "-h" | "--help" => Ok(CliCommand::Help),
            _ => Err(RegistrationError::InvalidArguments),
        };
    }

    let mut rest = args.iter().map(String::as_str).peekable();

    let moving = image_path(rest.next())?;
    let moving_region = region_options(&mut rest)?;
    let reference = image_path(rest.next())?;
    let reference_region = region_options(&mut rest)?;

    let verbose = match rest.next() {
        None => false,
        Some("-v" | "--verbose") => true,
        Some(_) => return Err(RegistrationError::InvalidArguments),
    };
    if rest.next().is_some() {
        return Err(RegistrationError::InvalidArguments);
    }

    Ok(CliCommand::Register(RegisterArgs {
        moving,
        moving_region,
        reference,
        reference_region,
        verbose,
    }))
}

fn image_path(arg: Option<&str>) -> RegResult<PathBuf> {
    match arg {
        Some(path) if !path.is_empty() && !path.starts_with('-') => Ok(PathBuf::from(path)),
        _ => Err(RegistrationError::InvalidArguments),
    }
}

fn region_options<'a, I>(rest: &mut std::iter::Peekable<I>) -> RegResult<RegionSource>
where
    I: Iterator<Item = &'a str>,
{
    match rest.peek().copied() {
        Some("-c" | "--crop") => {
            rest.next();
            let mut values = [0i64; 4];
            for value in values.iter_mut() {
                *value = rest
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or(RegistrationError::InvalidArguments)?;
            }
            let [x, y, w, h] = values;
            Ok(RegionSource::Rect(CropRect::new(x, y, w, h)))
        }
        Some("-g" | "--graphic") => {
            rest.next();
            Ok(RegionSource::Interactive)
        }
        _ => Ok(RegionSource::Full),
    }
}
