use crate::snapshot::PatternSnapshot;
use crate::window::Excerpt;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "WARP Log Analysis";

pub const DEFAULT_ASSISTANT_ROLE: &str = "You are an AI assistant specializing in WARP log analysis.";

pub const DEFAULT_PREAMBLE: &str = r#"WARP client functionality:
1. Device Control: Granular control over device access to applications.
2. Traffic Forwarding: Sends DNS and network traffic to Cloudflare for Zero Trust policy application.
3. Connections:
   a) Device orchestration (HTTPS): User registration, device posture, profile settings.
   b) DoH (HTTPS): DNS requests to Gateway for policy enforcement.
   c) WARP tunnel (UDP via WireGuard/MASQUE): IP packets for network/HTTP policy and private network access.
4. Split Tunnel: Determines traffic sent through WARP tunnel.
5. Local Domain Fallback: Configures DNS request handling.
6. DNS Handling:
   - Creates local DNS proxy (127.0.2.2, 127.0.2.3 for IPv4).
   - Configures OS to use this proxy for all DNS requests.
   - Forwards requests to Gateway or private DNS based on configuration.
7. IP Traffic Management:
   - Creates virtual network interface for WARP tunnel.
   - Modifies OS routing table for Split Tunnel rules.
   - Adjusts OS firewall to enforce Split Tunnel rules.
8. Routing: Default routes all traffic through WARP except for Split Tunnel exclude list.

Key components to check in logs:
- DNS resolution issues
- Tunnel connection problems
- Split Tunnel configuration errors
- Firewall rule conflicts
- Device registration or posture check failures
- Gateway policy enforcement issues

WARP operational stages and key log indicators:
- WARP is toggled on: log lines containing "INFO main_loop: warp::warp::tunnel: Initiate WARP connection protocol=Wireguard"
- WARP is connecting to the Cloudflare edge: log lines containing "Attempting Happy Eyeballs"
- WARP is creating the interface: log lines containing "Creating Network Service"
- WARP is adding routes: log lines containing "network_change: Routes changed"
- WARP is adding stub resolvers (DNS proxy): log lines "Initiate DNS connection" AND "Binding UDP and TCP sockets dns_servers=[127.0.2.2, 127.0.2.3]"
- WARP performs connectivity check outside the tunnel: log lines containing "engage.cloudflareclient.com"
- WARP performs connectivity check inside the tunnel: log lines containing "connectivity.cloudflareclient.com"
- WARP successfully connects: log lines "Sending IPC status update: Connected" AND "Ipc Broadcast ResponseStatus: Connected""#;

pub const DEFAULT_INSTRUCTIONS: &str = r#"Provide:
1. Lines signaling warnings or errors first, with their impact on WARP's core functions.
2. Each connection attempt in the excerpt and its outcome.
3. State transitions between the operational stages listed in the context.
4. How the log relates to any user-reported issue, including potential root causes.
5. Specific troubleshooting recommendations, citing any known error patterns that apply.

Use markdown formatting for clarity."#;

pub const NO_PATTERNS: &str = "No known error patterns available.";
pub const NO_USER_ISSUE: &str = "No user-reported issues.";

/// Static domain content wrapped around every prompt. Swapping it retargets
/// the analyzer at another client's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainKnowledge {
    pub title: String,
    pub assistant_role: String,
    pub preamble: String,
    pub instructions: String,
}

impl Default for DomainKnowledge {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            assistant_role: DEFAULT_ASSISTANT_ROLE.to_string(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPayload {
    pub messages: Vec<ChatMessage>,
}

impl PromptPayload {
    /// Flattens the messages for capabilities that take a single text prompt.
    pub fn to_text(&self) -> String {
        self.messages.iter().map(|m| m.content.as_str()).join("\n\n")
    }
}

pub fn render_known_patterns(snapshot: &PatternSnapshot) -> String {
    if snapshot.is_empty() {
        return NO_PATTERNS.to_string();
    }
    let entries = snapshot
        .iter()
        .map(|p| format!("- {}: {}", p.pattern, p.interpretation))
        .join("\n");
    format!("Known error patterns and interpretations:\n{entries}")
}

pub fn render_user_context(user_context: Option<&str>) -> String {
    match user_context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => format!("User-reported issue: {c}"),
        None => NO_USER_ISSUE.to_string(),
    }
}

/// System message: role, preamble, known patterns. User message: excerpt,
/// user context, instructions.
pub fn build_prompt(
    knowledge: &DomainKnowledge,
    excerpt: &Excerpt,
    snapshot: &PatternSnapshot,
    user_context: Option<&str>,
) -> PromptPayload {
    let system = format!(
        "{}\nUse this context:\n\n{}\n\n{}",
        knowledge.assistant_role,
        knowledge.preamble,
        render_known_patterns(snapshot),
    );
    let user = format!(
        "Analyze this log content:\n\n{}\n\n{}\n\n{}",
        excerpt.text,
        render_user_context(user_context),
        knowledge.instructions,
    );
    PromptPayload {
        messages: vec![
            ChatMessage { role: Role::System, content: system },
            ChatMessage { role: Role::User, content: user },
        ],
    }
}
