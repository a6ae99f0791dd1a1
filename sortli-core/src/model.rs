//! Domain data structures for recycling rules, bins, captured images, and advice.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Disposal stream a recycling rule points to.
pub enum BinType {
    /// Unsorted/residual waste.
    Grey,
    /// Organic and food waste.
    Brown,
    /// Plastic and metal packaging.
    Yellow,
    /// Paper and cardboard.
    Blue,
    /// Collection centers, electronics, hazardous items.
    Red,
    /// Glass.
    Green,
    /// Used cooking oil.
    OilSymbol,
    /// Batteries.
    BatterySymbol,
    /// Medicines returned to a pharmacy.
    WhiteWithGreenCross,
    /// Yellow street container (clothes and textiles).
    YellowStreet,
    /// Token not known to sortli, kept verbatim.
    Other(String),
}

impl BinType {
    /// Icon associated with this bin type, if any.
    #[must_use]
    pub fn icon(&self) -> Option<BinIcon> {
        match self {
            BinType::Other(raw) => BinIcon::from_key(raw),
            known => BinIcon::from_key(known.token()),
        }
    }

    fn token(&self) -> &str {
        match self {
            BinType::Grey => "grey",
            BinType::Brown => "brown",
            BinType::Yellow => "yellow",
            BinType::Blue => "blue",
            BinType::Red => "red",
            BinType::Green => "green",
            BinType::OilSymbol => "oil_symbol",
            BinType::BatterySymbol => "battery_symbol",
            BinType::WhiteWithGreenCross => "white_with_green_cross",
            BinType::YellowStreet => "yellow_street",
            BinType::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for BinType {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "grey" | "gray" => BinType::Grey,
            "brown" => BinType::Brown,
            "yellow" => BinType::Yellow,
            "blue" => BinType::Blue,
            "red" => BinType::Red,
            "green" => BinType::Green,
            "oil_symbol" => BinType::OilSymbol,
            "battery_symbol" => BinType::BatterySymbol,
            "white_with_green_cross" => BinType::WhiteWithGreenCross,
            "yellow_street" => BinType::YellowStreet,
            _ => BinType::Other(raw),
        }
    }
}

impl From<BinType> for String {
    fn from(bin: BinType) -> Self {
        match bin {
            BinType::Other(raw) => raw,
            known => known.token().to_owned(),
        }
    }
}

impl fmt::Display for BinType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One entry of the recycling rules document.
pub struct RecyclingRule {
    /// Category identifier, e.g. "plastic bottle".
    pub name: String,
    /// Bin the category belongs in.
    #[serde(alias = "bin_type")]
    pub bin_type: BinType,
    /// Preparation notes such as "rinse before disposal".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation: Option<String>,
    /// Why the category goes in that bin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RecyclingRule {
    /// Construct a rule without preparation or reason notes.
    #[must_use]
    pub fn new<N: Into<String>>(name: N, bin_type: BinType) -> Self {
        Self {
            name: name.into(),
            bin_type,
            preparation: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Static icon shown next to an advice block.
pub enum BinIcon {
    /// Grey bin for unsorted waste.
    GreyBin,
    /// Brown bin for organic waste.
    BrownBin,
    /// Yellow bin for plastic and metal.
    YellowBin,
    /// Blue bin for paper.
    BlueBin,
    /// Red bin for collection centers.
    RedBin,
    /// Green bin for glass.
    GreenBin,
    /// Yellow street container.
    YellowStreet,
    /// Used oil symbol.
    OilSymbol,
    /// Battery symbol.
    BatterySymbol,
    /// Pharmacy cross.
    Pharmacy,
}

impl BinIcon {
    /// Look up an icon by its bin key. Unknown keys yield `None`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let icon = match key.trim().to_lowercase().as_str() {
            "grey" => BinIcon::GreyBin,
            "brown" => BinIcon::BrownBin,
            "yellow" => BinIcon::YellowBin,
            "blue" => BinIcon::BlueBin,
            "red" => BinIcon::RedBin,
            "green" => BinIcon::GreenBin,
            "yellow_street" => BinIcon::YellowStreet,
            "oil_symbol" => BinIcon::OilSymbol,
            "battery_symbol" => BinIcon::BatterySymbol,
            "white_with_green_cross" => BinIcon::Pharmacy,
            _ => return None,
        };
        Some(icon)
    }

    /// Image file name inside the icon directory.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            BinIcon::GreyBin => "grey.png",
            BinIcon::BrownBin => "brown.png",
            BinIcon::YellowBin => "yellow.png",
            BinIcon::BlueBin => "blu.png",
            BinIcon::RedBin => "red.png",
            BinIcon::GreenBin => "green.png",
            BinIcon::YellowStreet => "yellow_street.png",
            BinIcon::OilSymbol => "oil_symbol.png",
            BinIcon::BatterySymbol => "battery_symbol.png",
            BinIcon::Pharmacy => "white_with_green_cross.png",
        }
    }

    /// Full path of the icon image below `images_dir`.
    #[must_use]
    pub fn asset_path(self, images_dir: &Path) -> PathBuf {
        images_dir.join(self.file_name())
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            BinIcon::GreyBin => "Grey bin",
            BinIcon::BrownBin => "Brown bin",
            BinIcon::YellowBin => "Yellow bin",
            BinIcon::BlueBin => "Blue bin",
            BinIcon::RedBin => "Red bin",
            BinIcon::GreenBin => "Green bin",
            BinIcon::YellowStreet => "Yellow street container",
            BinIcon::OilSymbol => "Used oil",
            BinIcon::BatterySymbol => "Batteries",
            BinIcon::Pharmacy => "Pharmacy",
        }
    }
}

#[derive(Debug, Clone)]
/// JPEG data captured by the user.
pub struct CapturedImage {
    bytes: Vec<u8>,
    source: Option<PathBuf>,
}

impl CapturedImage {
    /// Wrap raw image bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: None,
        }
    }

    /// Read an image from disk.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be read.
    pub async fn load(path: &Path) -> io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            bytes,
            source: Some(path.to_path_buf()),
        })
    }

    /// Raw image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Path the image was loaded from, if it came from disk.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether the image holds no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One paragraph of generated advice with the icon resolved for it.
pub struct AdviceBlock {
    /// Paragraph text.
    pub text: String,
    /// Icon matching the paragraph, if any keyword matched.
    pub icon: Option<BinIcon>,
}

#[derive(Debug, Clone)]
/// State of a single capture-to-advice interaction.
pub struct Session {
    /// The captured image.
    pub image: CapturedImage,
    /// When the image was handed to the pipeline.
    pub captured_at: DateTime<Local>,
    /// Raw classifier output.
    pub identified_items: String,
    /// Raw generator output.
    pub advice: String,
    /// Advice split into blocks, in generator order.
    pub blocks: Vec<AdviceBlock>,
}

impl Session {
    /// Start a session for a freshly captured image.
    #[must_use]
    pub fn new(image: CapturedImage) -> Self {
        Self {
            image,
            captured_at: Local::now(),
            identified_items: String::new(),
            advice: String::new(),
            blocks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Identifies a hosted service an adapter talks to.
pub struct ServiceMeta {
    /// Vendor name, e.g. "openai".
    pub name: String,
    /// Model used for requests.
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Author of a turn in a tool exchange.
pub enum Role {
    /// Instructions for the model.
    System,
    /// End-user request.
    User,
    /// Model reply.
    Assistant,
    /// Result of a tool run.
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Tool invocation requested by the model.
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One turn of a tool-augmented exchange.
pub struct ExchangeTurn {
    /// Who produced the turn.
    pub role: Role,
    /// Text content, absent for pure tool-call replies.
    pub content: Option<String>,
    /// Tools the assistant asked to run.
    pub tool_calls: Vec<ToolCall>,
    /// Call answered by a tool turn.
    pub tool_call_id: Option<String>,
}

impl ExchangeTurn {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// System instruction turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// User request turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Assistant turn carrying text and/or tool calls.
    #[must_use]
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool result answering `call_id`.
    #[must_use]
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Whether the turn asks for tools to be run.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Ordered turns accumulated during one site-finder invocation.
pub struct ToolExchange {
    turns: Vec<ExchangeTurn>,
}

impl ToolExchange {
    /// Empty exchange.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn push(&mut self, turn: ExchangeTurn) {
        self.turns.push(turn);
    }

    /// All turns in order.
    #[must_use]
    pub fn turns(&self) -> &[ExchangeTurn] {
        &self.turns
    }

    /// Number of turns with the given role.
    #[must_use]
    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Tool declaration sent to the generator.
pub struct ToolSpec {
    /// Function name the model calls.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether the generator may request tool runs.
pub enum ToolPolicy {
    /// The model decides.
    Auto,
    /// Tool calls are forbidden.
    None,
}
