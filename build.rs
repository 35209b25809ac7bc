use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    network: Network,
    session: Session,
    audio: Audio,
    control: Control,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
    model: String,
    api_key_env: String,
}

#[derive(Deserialize)]
struct Session {
    voice: String,
    system_instruction: String,
    auto_connect: bool,
}

#[derive(Deserialize)]
struct Audio {
    input_sample_rate: u32,
    output_sample_rate: u32,
    capture_window: usize,
    capture_device: String,
    playback_device: String,
    playback_channels: u32,
    playback_period_size: usize,
    keep_alive_frequency: f32,
    keep_alive_amplitude: f32,
}

#[derive(Deserialize)]
struct Control {
    local_ip: String,
    local_port: u16,
    remote_ip: String,
    remote_port: u16,
    buffer_size: usize,
}

// rustc-env values are line based
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 网络配置
    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);
    println!("cargo:rustc-env=LIVE_MODEL={}", config.network.model);
    println!("cargo:rustc-env=API_KEY_ENV={}", config.network.api_key_env);

    // 会话配置
    println!("cargo:rustc-env=VOICE_NAME={}", config.session.voice);
    println!(
        "cargo:rustc-env=SYSTEM_INSTRUCTION={}",
        single_line(&config.session.system_instruction)
    );
    println!("cargo:rustc-env=AUTO_CONNECT={}", config.session.auto_connect);

    // 音频配置
    println!("cargo:rustc-env=INPUT_SAMPLE_RATE={}", config.audio.input_sample_rate);
    println!("cargo:rustc-env=OUTPUT_SAMPLE_RATE={}", config.audio.output_sample_rate);
    println!("cargo:rustc-env=CAPTURE_WINDOW={}", config.audio.capture_window);
    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=PLAYBACK_CHANNELS={}", config.audio.playback_channels);
    println!("cargo:rustc-env=PLAYBACK_PERIOD_SIZE={}", config.audio.playback_period_size);
    println!("cargo:rustc-env=KEEP_ALIVE_FREQUENCY={}", config.audio.keep_alive_frequency);
    println!("cargo:rustc-env=KEEP_ALIVE_AMPLITUDE={}", config.audio.keep_alive_amplitude);

    // 前端控制通道配置
    println!("cargo:rustc-env=CONTROL_LOCAL_IP={}", config.control.local_ip);
    println!("cargo:rustc-env=CONTROL_LOCAL_PORT={}", config.control.local_port);
    println!("cargo:rustc-env=CONTROL_REMOTE_IP={}", config.control.remote_ip);
    println!("cargo:rustc-env=CONTROL_REMOTE_PORT={}", config.control.remote_port);
    println!("cargo:rustc-env=CONTROL_BUFFER_SIZE={}", config.control.buffer_size);
}
