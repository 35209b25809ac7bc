use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 网络配置（静态部分）
    pub ws_url: &'static str,
    pub model: &'static str,
    pub api_key_env: &'static str,

    // 运行时从环境变量读取，唯一的动态配置
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    // 会话参数
    pub voice_name: &'static str,
    pub system_instruction: &'static str,
    pub auto_connect: bool,

    // 音频参数
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub capture_window: usize,
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub playback_channels: u32,
    pub playback_period_size: usize,
    pub keep_alive_frequency: f32,
    pub keep_alive_amplitude: f32,

    // 前端控制通道配置
    pub control_local_ip: &'static str,
    pub control_local_port: u16,
    pub control_remote_ip: &'static str,
    pub control_remote_port: u16,
    pub control_buffer_size: usize,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 除 API key 外，所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        let api_key_env = env!("API_KEY_ENV");

        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            ws_url: env!("WS_URL"),
            model: env!("LIVE_MODEL"),
            api_key_env,
            api_key: read_api_key(api_key_env),

            voice_name: env!("VOICE_NAME"),
            system_instruction: env!("SYSTEM_INSTRUCTION"),
            auto_connect: env!("AUTO_CONNECT").parse()
                .map_err(|_| "Failed to parse AUTO_CONNECT")?,

            input_sample_rate: env!("INPUT_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse INPUT_SAMPLE_RATE")?,
            output_sample_rate: env!("OUTPUT_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse OUTPUT_SAMPLE_RATE")?,
            capture_window: env!("CAPTURE_WINDOW").parse()
                .map_err(|_| "Failed to parse CAPTURE_WINDOW")?,
            capture_device: env!("CAPTURE_DEVICE"),
            playback_device: env!("PLAYBACK_DEVICE"),
            playback_channels: env!("PLAYBACK_CHANNELS").parse()
                .map_err(|_| "Failed to parse PLAYBACK_CHANNELS")?,
            playback_period_size: env!("PLAYBACK_PERIOD_SIZE").parse()
                .map_err(|_| "Failed to parse PLAYBACK_PERIOD_SIZE")?,
            keep_alive_frequency: env!("KEEP_ALIVE_FREQUENCY").parse()
                .map_err(|_| "Failed to parse KEEP_ALIVE_FREQUENCY")?,
            keep_alive_amplitude: env!("KEEP_ALIVE_AMPLITUDE").parse()
                .map_err(|_| "Failed to parse KEEP_ALIVE_AMPLITUDE")?,

            control_local_ip: env!("CONTROL_LOCAL_IP"),
            control_local_port: env!("CONTROL_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse CONTROL_LOCAL_PORT")?,
            control_remote_ip: env!("CONTROL_REMOTE_IP"),
            control_remote_port: env!("CONTROL_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse CONTROL_REMOTE_PORT")?,
            control_buffer_size: env!("CONTROL_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse CONTROL_BUFFER_SIZE")?,
        })
    }

    /// The credential that gates `connect()`. Blank values count as missing.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn input_mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.input_sample_rate)
    }
}

fn read_api_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|key| !key.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
