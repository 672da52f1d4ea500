use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("framelink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: framelink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FRAMELINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "defaults: encode_fps={}, decode_fps={}, frame_size={}, window={}",
        framelink_chunk::DEFAULT_ENCODE_FRAME_RATE,
        framelink_decode::DEFAULT_DECODE_FRAME_RATE,
        framelink_transport::DEFAULT_FRAME_MAX_LENGTH,
        framelink_decode::DEFAULT_WINDOW_WIDTH
    );

    Ok(SUCCESS)
}
