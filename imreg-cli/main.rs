use std::path::Path;
use std::process::ExitCode;

use image::DynamicImage;
use imreg_cli::{
    COMMAND_LINE_FAIL, CliCommand, MATCHES_FILE, PromptSelector, RegResult, RegisterArgs, Registration,
    RegistrationError, RegionSelector, RegionSource, aligned_output_path, crop, draw_matches, help_text,
    load_config, logging, parse_args, resolve_region, version_line, write_outputs,
};
use imreg_core::init_thread_pool;
use log::debug;

fn main() -> ExitCode {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(_) => {
            println!("{}", COMMAND_LINE_FAIL);
            return ExitCode::FAILURE;
        }
    };

    match command {
        CliCommand::Help => {
            println!("{}", help_text());
            ExitCode::SUCCESS
        }
        CliCommand::Version => {
            println!("{}", version_line());
            ExitCode::SUCCESS
        }
        CliCommand::Register(args) => {
            // Keep the handle alive until the end of the run
            let _logger = match logging::init_logging(args.verbose) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    eprintln!("logging disabled: {}", err);
                    None
                }
            };

            match register(&args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    println!("{}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn register(args: &RegisterArgs) -> RegResult<()> {
    let config = load_config()?;
    if let Err(err) = init_thread_pool(config.threads) {
        debug!("keeping the existing thread pool: {}", err);
    }
    debug!("{}", config.summary());

    let moving = load_image(&args.moving, args.verbose)?;
    let reference = load_image(&args.reference, args.verbose)?;

    let mut selector = PromptSelector::stdio();
    let moving = select_region(moving, &args.moving, args.moving_region, &mut selector)?;
    let reference = select_region(reference, &args.reference, args.reference_region, &mut selector)?;

    if args.verbose {
        println!("Initiating image registration.");
    }
    let result = Registration::new(config)?.run(&moving, &reference)?;

    let matches = draw_matches(
        &moving,
        &result.moving_keypoints,
        &reference,
        &result.reference_keypoints,
        &result.correspondences,
        &result.inliers,
    );
    let aligned_path = aligned_output_path(&args.moving);
    write_outputs(&matches, Path::new(MATCHES_FILE), &result.aligned, &aligned_path)?;

    println!("Saved matching keypoints in '{}'.", MATCHES_FILE);
    println!("The registered image was saved at: '{}'.", aligned_path.display());
    Ok(())
}

fn load_image(path: &Path, verbose: bool) -> RegResult<DynamicImage> {
    if verbose {
        println!("reading image '{}'.", path.display());
    }
    image::open(path).map_err(|source| RegistrationError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })
}

fn select_region(
    image: DynamicImage,
    path: &Path,
    region: RegionSource,
    selector: &mut dyn RegionSelector,
) -> RegResult<DynamicImage> {
    let label = path.display().to_string();
    let rect = resolve_region(region, &label, &image, selector)?;
    crop(image, rect)
}
