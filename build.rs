use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Drop a config template next to the build output if there is none
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../tsdemux.template.toml");

    let template = r#"# tsdemux configuration template
# Copy this file to 'tsdemux.toml' and adjust as needed.
# Every key may also be set through a TSDEMUX_<KEY> environment variable.

guess_video_frame_end = true
streaming = false
video_buffer_size = 524288
audio_buffer_size = 131072
chunk_size = 1048576

# ws:// and wss:// URLs imply streaming = true
# source_url = "wss://example.com/stream"
"#;

    if !template_path.exists() {
        let _ = fs::write(template_path, template);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
