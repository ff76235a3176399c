//! Image Synthesis Requests
//!
//! Request model and wire formats for the image-generation service. Two
//! transports exist: calling the `generateContent` endpoint directly with an
//! API key, or going through a password-protected proxy that holds the key.
//! The crate only builds and parses JSON; the HTTP round trip is done by
//! whatever implements [`Synthesizer`] (in the browser, a page-provided JS
//! function).

use std::fmt;
use std::str::FromStr;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::image_state::{DataUri, ImageState};

const MASK_PREAMBLE: &str =
    "The second image is a mask where red marks the area to change. Keep everything outside red identical. ";
const REFERENCE_PREAMBLE: &str =
    "Generate an image matching the style or subject of the provided reference. Prompt: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeminiModel {
    #[default]
    #[serde(rename = "gemini-2.5-flash-image")]
    Flash25,
    #[serde(rename = "gemini-3-pro-image-preview")]
    Pro3,
}

impl GeminiModel {
    pub const ALL: [GeminiModel; 2] = [GeminiModel::Flash25, GeminiModel::Pro3];

    pub fn id(self) -> &'static str {
        match self {
            GeminiModel::Flash25 => "gemini-2.5-flash-image",
            GeminiModel::Pro3 => "gemini-3-pro-image-preview",
        }
    }

    /// Only the Pro model accepts an output size tier
    pub fn supports_image_size(self) -> bool {
        self == GeminiModel::Pro3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "3:4")]
    Portrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Widescreen,
        AspectRatio::Vertical,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Portrait => "3:4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [ImageSize::OneK, ImageSize::TwoK, ImageSize::FourK];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ty, $name:literal, $to_str:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.$to_str())
            }
        }

        impl FromStr for $ty {
            type Err = StudioError;

            fn from_str(s: &str) -> Result<Self> {
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.$to_str() == s.trim())
                    .ok_or_else(|| StudioError::Config(format!("unknown {}: {}", $name, s)))
            }
        }
    };
}

display_and_parse!(GeminiModel, "model", id);
display_and_parse!(AspectRatio, "aspect ratio", as_str);
display_and_parse!(ImageSize, "image size", as_str);

/// Edit the working image, or generate a new one from text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Edit,
    Generate,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Key for calling the service directly
    ApiKey(String),
    /// Password for the proxy that holds the key
    Password(String),
}

impl Credential {
    fn secret(&self) -> &str {
        match self {
            Credential::ApiKey(s) | Credential::Password(s) => s,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credential::Password(_) => f.write_str("Password(***)"),
        }
    }
}

/// One-click style presets; each supplies the prompt for an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleFilter {
    Vintage,
    Noir,
    Cartoon,
    Cyberpunk,
}

impl StyleFilter {
    pub const ALL: [StyleFilter; 4] = [
        StyleFilter::Vintage,
        StyleFilter::Noir,
        StyleFilter::Cartoon,
        StyleFilter::Cyberpunk,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StyleFilter::Vintage => "Vintage",
            StyleFilter::Noir => "Noir",
            StyleFilter::Cartoon => "Cartoon",
            StyleFilter::Cyberpunk => "Cyberpunk",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            StyleFilter::Vintage => "Apply a vintage, retro 70s film look with warm tones and slight grain.",
            StyleFilter::Noir => "Convert to high-contrast black and white noir style with dramatic lighting.",
            StyleFilter::Cartoon => "Transform into a vibrant, clean-lined cartoon or cel-shaded illustration.",
            StyleFilter::Cyberpunk => "Apply a cyberpunk aesthetic with neon pink and cyan lights.",
        }
    }
}

/// Everything needed for one synthesis call
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub mode: Mode,
    pub model: GeminiModel,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub image_size: Option<ImageSize>,
    /// Image being edited; only sent in [`Mode::Edit`]
    pub source_image: Option<ImageState>,
    pub mask_image: Option<ImageState>,
    pub reference_image: Option<ImageState>,
    pub credential: Option<Credential>,
}

impl SynthesisRequest {
    /// Text-to-image request with default settings
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            mode: Mode::Generate,
            model: GeminiModel::default(),
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            image_size: None,
            source_image: None,
            mask_image: None,
            reference_image: None,
            credential: None,
        }
    }

    /// Switch to editing `source`
    pub fn with_source_image(mut self, source: ImageState) -> Self {
        self.mode = Mode::Edit;
        self.source_image = Some(source);
        self
    }

    pub fn with_mask(mut self, mask: Option<ImageState>) -> Self {
        self.mask_image = mask;
        self
    }

    pub fn with_reference(mut self, reference: Option<ImageState>) -> Self {
        self.reference_image = reference;
        self
    }

    pub fn with_model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_image_size(mut self, image_size: ImageSize) -> Self {
        self.image_size = Some(image_size);
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Reject requests that must not reach the service
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(StudioError::EmptyPrompt);
        }
        match &self.credential {
            Some(c) if !c.secret().trim().is_empty() => {}
            _ => return Err(StudioError::MissingCredential),
        }
        if self.mode == Mode::Edit && self.source_image.is_none() {
            return Err(StudioError::Config("edit request without a source image".into()));
        }
        Ok(())
    }

    /// Prompt text as sent to the model, preambles included
    pub fn composed_prompt(&self) -> String {
        match self.mode {
            Mode::Edit if self.mask_image.is_some() => format!("{MASK_PREAMBLE}{}", self.prompt),
            Mode::Edit => self.prompt.clone(),
            Mode::Generate if self.reference_image.is_some() => format!("{REFERENCE_PREAMBLE}{}", self.prompt),
            Mode::Generate => self.prompt.clone(),
        }
    }

    /// Size tier actually sent: generation on the Pro model only
    fn effective_image_size(&self) -> Option<ImageSize> {
        match self.mode {
            Mode::Generate if self.model.supports_image_size() => self.image_size,
            _ => None,
        }
    }

    /// Body for a direct `generateContent` call. Images go first (source,
    /// mask, reference), the text part last.
    pub fn to_generate_content(&self) -> Result<GenerateContentRequest> {
        let mut parts = Vec::new();
        if self.mode == Mode::Edit {
            for image in [&self.source_image, &self.mask_image].into_iter().flatten() {
                parts.push(Part::inline(image)?);
            }
        }
        if let Some(reference) = &self.reference_image {
            parts.push(Part::inline(reference)?);
        }
        parts.push(Part::text(self.composed_prompt()));

        Ok(GenerateContentRequest {
            contents: Content { parts },
            generation_config: GenerationConfig {
                image_config: ImageConfig {
                    aspect_ratio: self.aspect_ratio,
                    image_size: self.effective_image_size(),
                },
            },
        })
    }

    /// Body for the password proxy, which composes the prompt itself
    pub fn to_proxy_body(&self, password: &str) -> ProxyRequest {
        let edit = self.mode == Mode::Edit;
        ProxyRequest {
            password: password.to_string(),
            prompt: self.prompt.clone(),
            model: self.model,
            aspect_ratio: self.aspect_ratio,
            image_size: self.effective_image_size(),
            source_image: if edit { self.source_image.clone() } else { None },
            mask_image: if edit { self.mask_image.clone() } else { None },
            reference_image: self.reference_image.clone(),
        }
    }

    /// Transport-ready call description
    pub fn dispatch(&self) -> Result<Dispatch> {
        self.validate()?;
        match &self.credential {
            Some(Credential::ApiKey(key)) => Ok(Dispatch {
                transport: Transport::Direct,
                path: format!("models/{}:generateContent", self.model.id()),
                api_key: Some(key.clone()),
                body: serde_json::to_value(self.to_generate_content()?)?,
            }),
            Some(Credential::Password(password)) => Ok(Dispatch {
                transport: Transport::Proxy,
                path: match self.mode {
                    Mode::Edit => "/geminiEdit".to_string(),
                    Mode::Generate => "/geminiGenerate".to_string(),
                },
                api_key: None,
                body: serde_json::to_value(self.to_proxy_body(password))?,
            }),
            None => Err(StudioError::MissingCredential),
        }
    }

    /// Turn a service response (JSON text) into the resulting image
    pub fn parse_response(&self, json: &str) -> Result<ImageState> {
        match &self.credential {
            Some(Credential::Password(_)) => {
                let response: ProxyResponse = serde_json::from_str(json)?;
                response.into_image(self.mode)
            }
            _ => {
                let response: GenerateContentResponse = serde_json::from_str(json)?;
                response.into_image(self.mode)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Direct,
    Proxy,
}

/// What a [`Synthesizer`] has to send
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    pub transport: Transport,
    /// Model method for direct calls, proxy route otherwise
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    fn inline(image: &ImageState) -> Result<Self> {
        let uri = DataUri::parse(image.as_str())?;
        Ok(Self {
            inline_data: Some(InlineData {
                mime_type: uri.mime_type.to_string(),
                data: uri.base64.to_string(),
            }),
            text: None,
        })
    }

    fn text(text: String) -> Self {
        Self {
            inline_data: None,
            text: Some(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub image_config: ImageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub password: String,
    pub prompt: String,
    pub model: GeminiModel,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<ImageState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_image: Option<ImageState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<ImageState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// First inline image of the first candidate; otherwise the model's text
    /// becomes the error
    pub fn into_image(self, mode: Mode) -> Result<ImageState> {
        let Some(parts) = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .filter(|parts| !parts.is_empty())
        else {
            let message = match mode {
                Mode::Edit => "No image returned. Check your prompt or image content.",
                Mode::Generate => "No candidates returned from the API.",
            };
            return Err(StudioError::Synthesis(message.to_string()));
        };

        if let Some(data) = parts.iter().find_map(|p| p.inline_data.as_ref()) {
            return Ok(ImageState::new(format!("data:{};base64,{}", data.mime_type, data.data)));
        }
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            Err(StudioError::Synthesis("No image generated.".to_string()))
        } else {
            Err(StudioError::Synthesis(text))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyResponse {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProxyResponse {
    pub fn into_image(self, mode: Mode) -> Result<ImageState> {
        match (self.image, self.error) {
            (Some(image), _) if !image.is_empty() => Ok(ImageState::new(image)),
            (_, Some(error)) if !error.is_empty() => Err(StudioError::Synthesis(error)),
            _ => Err(StudioError::Synthesis(
                match mode {
                    Mode::Edit => "Edit failed",
                    Mode::Generate => "Generation failed",
                }
                .to_string(),
            )),
        }
    }
}

/// Performs the network round trip for a request
pub trait Synthesizer {
    fn synthesize(&self, request: SynthesisRequest) -> LocalBoxFuture<'static, Result<ImageState>>;
}

#[cfg(target_arch = "wasm32")]
pub use web::JsSynthesizer;

#[cfg(target_arch = "wasm32")]
mod web {
    use futures::FutureExt;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_futures::JsFuture;

    use super::*;

    /// Forwards each [`Dispatch`] as a JSON string to a page function that
    /// performs the fetch and resolves with the response body text
    pub struct JsSynthesizer {
        function: js_sys::Function,
    }

    impl JsSynthesizer {
        pub fn new(function: js_sys::Function) -> Self {
            Self { function }
        }
    }

    impl Synthesizer for JsSynthesizer {
        fn synthesize(&self, request: SynthesisRequest) -> LocalBoxFuture<'static, Result<ImageState>> {
            let function = self.function.clone();
            async move {
                let payload = serde_json::to_string(&request.dispatch()?)?;
                let returned = function
                    .call1(&JsValue::NULL, &JsValue::from_str(&payload))
                    .map_err(js_error)?;
                let resolved = JsFuture::from(js_sys::Promise::resolve(&returned))
                    .await
                    .map_err(js_error)?;
                let body = resolved
                    .as_string()
                    .ok_or_else(|| StudioError::Js("synthesis hook must resolve to a string".into()))?;
                request.parse_response(&body)
            }
            .boxed_local()
        }
    }

    fn js_error(value: JsValue) -> StudioError {
        StudioError::Js(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
    }
}
