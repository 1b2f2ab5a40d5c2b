use serde::{Deserialize, Serialize};

/// Marker the backend recognizes as "translate this prompt before generating".
pub const ENHANCE_PREFIX: &str = "---tl";

/// Sizes the form offers. Others are forwarded unchanged.
pub const SUPPORTED_SIZES: [&str; 3] = ["512x512", "768x768", "1024x1024"];
pub const DEFAULT_SIZE: &str = "1024x1024";

pub const MIN_NUM_STEPS: i32 = 4;
pub const MAX_NUM_STEPS: i32 = 8;

/// Untyped form fields as submitted by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGenerationForm {
    pub prompt: Option<String>,
    pub enhance: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
    #[serde(rename = "numSteps")]
    pub num_steps: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub enhance: bool,
    pub model_id: String,
    pub size: String,
    pub num_steps: i32,
}

impl GenerationRequest {
    /// The prompt as the backend should receive it.
    pub fn final_prompt(&self) -> String {
        if self.enhance {
            format!("{} {}", ENHANCE_PREFIX, self.prompt)
        } else {
            self.prompt.clone()
        }
    }
}

/// Values used when the form leaves a field out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationDefaults {
    pub model: String,
    pub size: String,
    pub num_steps: i32,
    pub min_steps: i32,
    pub max_steps: i32,
    pub sizes: Vec<String>,
}

impl GenerationDefaults {
    pub fn new(model: impl Into<String>, num_steps: i32) -> Self {
        Self {
            model: model.into(),
            size: DEFAULT_SIZE.to_string(),
            num_steps,
            min_steps: MIN_NUM_STEPS,
            max_steps: MAX_NUM_STEPS,
            sizes: SUPPORTED_SIZES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn steps_in_range(&self, num_steps: i32) -> bool {
        (self.min_steps..=self.max_steps).contains(&num_steps)
    }

    pub fn is_supported_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }
}

/// Parses a `WxH` size string into width and height.
pub fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (width, height) = size.trim().split_once(['x', 'X'])?;
    let width = width.trim().parse().ok()?;
    let height = height.trim().parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
