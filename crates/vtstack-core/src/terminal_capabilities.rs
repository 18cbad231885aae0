#![forbid(unsafe_code)]

//! Terminal capability model used by the sync engine's output optimizer.
//!
//! Every optimization the sync engine performs (line clearing, erase and
//! repeat compression, bottom-right corner handling, charset switching) is
//! gated on a flag in [`TerminalCapabilities`]. Absence of a capability is
//! never an error: the engine falls through to plain character output.
//!
//! # Capability Profiles
//!
//! | Profile | Description |
//! |---------|-------------|
//! | `modern()` | xterm-compatible emulator with synchronized output |
//! | `xterm_256color()` | Standard xterm with 256-color support |
//! | `xterm()` | Basic xterm with 16 colors |
//! | `vt100()` | VT100 (no color, no ECH/REP/ICH) |
//! | `linux_console()` | Linux virtual console (8 colors, PC charset) |
//! | `screen()` | GNU Screen multiplexer |
//! | `tmux()` | tmux multiplexer |
//! | `dumb()` | Dumb terminal (no capabilities) |
//!
//! ## Profile Builder
//!
//! ```
//! use vtstack_core::terminal_capabilities::CapabilityProfileBuilder;
//!
//! let custom = CapabilityProfileBuilder::new()
//!     .ansi_colors(true)
//!     .clear_eol(true)
//!     .repeat_char(true)
//!     .build();
//! assert!(custom.repeat_char);
//! ```
//!
//! # Detection Strategy
//!
//! - `TERM`: terminal family (xterm, linux, vt100, screen, tmux, dumb)
//! - `TERM_PROGRAM`: specific emulator (WezTerm, Alacritty, Ghostty, ...)
//! - `COLORTERM`: truecolor/24bit implies a 256-color palette
//! - `NO_COLOR`: disables color output
//! - `LC_ALL` / `LC_CTYPE` / `LANG`: UTF-8 locale detection
//! - `TMUX`, `STY`: multiplexer detection
//!
//! # Invariants
//!
//! 1. `use_sync_output()` is `false` inside any multiplexer.
//! 2. Given the same environment, detection always yields the same result.
//! 3. A dumb terminal has every optimization disabled; only `auto_right_margin`
//!    is assumed, which makes the bottom-right cell unwritable.

use std::env;

#[derive(Debug, Clone, Default)]
struct DetectInputs {
    no_color: bool,
    term: String,
    term_program: String,
    colorterm: String,
    locale: String,
    in_tmux: bool,
    in_screen: bool,
}

impl DetectInputs {
    fn from_env() -> Self {
        // LC_ALL overrides LC_CTYPE which overrides LANG.
        let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|name| env::var(name).ok())
            .find(|value| !value.is_empty())
            .unwrap_or_default();
        Self {
            no_color: env::var("NO_COLOR").is_ok(),
            term: env::var("TERM").unwrap_or_default(),
            term_program: env::var("TERM_PROGRAM").unwrap_or_default(),
            colorterm: env::var("COLORTERM").unwrap_or_default(),
            locale,
            in_tmux: env::var("TMUX").is_ok(),
            in_screen: env::var("STY").is_ok(),
        }
    }
}

/// Emulators that implement the full xterm control set.
const MODERN_TERMINALS: &[&str] = &[
    "iTerm.app",
    "WezTerm",
    "Alacritty",
    "Ghostty",
    "kitty",
    "Rio",
    "Contour",
    "vscode",
];

/// Terminal programs that support synchronized output (DEC 2026).
const SYNC_OUTPUT_TERMINALS: &[&str] = &["WezTerm", "Alacritty", "Ghostty", "kitty", "Contour"];

/// Known terminal profile identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalProfile {
    /// Modern xterm-compatible emulator.
    Modern,
    /// xterm with 256-color support.
    Xterm256Color,
    /// Basic xterm with 16 colors.
    Xterm,
    /// VT100 terminal (minimal).
    Vt100,
    /// Linux virtual console.
    LinuxConsole,
    /// GNU Screen multiplexer.
    Screen,
    /// tmux multiplexer.
    Tmux,
    /// Dumb terminal (no capabilities).
    Dumb,
    /// Custom profile (user-defined).
    Custom,
    /// Auto-detected from environment.
    Detected,
}

impl TerminalProfile {
    /// Get the profile name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Xterm256Color => "xterm-256color",
            Self::Xterm => "xterm",
            Self::Vt100 => "vt100",
            Self::LinuxConsole => "linux",
            Self::Screen => "screen",
            Self::Tmux => "tmux",
            Self::Dumb => "dumb",
            Self::Custom => "custom",
            Self::Detected => "detected",
        }
    }

    /// All predefined profiles (excluding Custom and Detected).
    #[must_use]
    pub const fn all_predefined() -> &'static [Self] {
        &[
            Self::Modern,
            Self::Xterm256Color,
            Self::Xterm,
            Self::Vt100,
            Self::LinuxConsole,
            Self::Screen,
            Self::Tmux,
            Self::Dumb,
        ]
    }
}

impl std::str::FromStr for TerminalProfile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "modern" => Ok(Self::Modern),
            "xterm-256color" | "xterm256color" | "xterm-256" => Ok(Self::Xterm256Color),
            "xterm" => Ok(Self::Xterm),
            "vt100" => Ok(Self::Vt100),
            "linux" | "linux-console" => Ok(Self::LinuxConsole),
            "screen" | "screen-256color" => Ok(Self::Screen),
            "tmux" | "tmux-256color" => Ok(Self::Tmux),
            "dumb" => Ok(Self::Dumb),
            "custom" => Ok(Self::Custom),
            "detected" | "auto" => Ok(Self::Detected),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TerminalProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal capability model.
///
/// The flags mirror the terminfo capabilities the sync engine consults
/// (`el`, `el1`, `ech`, `rep`, `ich1`, `am`, `xenl`, `bce`, `smam`/`rmam`,
/// `smacs`/`rmacs`). Use [`detect`](Self::detect) for the current
/// environment or one of the const profiles for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    profile: TerminalProfile,

    // Color support
    /// 8-color ANSI palette (SGR 30-37 / 40-47).
    pub ansi_colors: bool,
    /// aixterm bright colors (SGR 90-97 / 100-107).
    pub bright_colors: bool,
    /// 256-color palette (SGR 38;5;n / 48;5;n).
    pub colors_256: bool,
    /// Erase operations fill with the current background color (`bce`).
    pub background_color_erase: bool,

    // Optimization primitives
    /// Clear to end of line (`EL 0`).
    pub clear_eol: bool,
    /// Clear to beginning of line (`EL 1`).
    pub clear_bol: bool,
    /// Erase N characters in place (`ECH`).
    pub erase_chars: bool,
    /// Repeat the preceding graphic character (`REP`).
    pub repeat_char: bool,
    /// Insert blank characters (`ICH`).
    pub insert_character: bool,

    // Margin behavior
    /// Cursor wraps to the next line after the last column (`am`).
    pub auto_right_margin: bool,
    /// Auto-wrap can be toggled with DECAWM (`CSI ? 7 h/l`).
    pub auto_margin_toggle: bool,
    /// The cursor lingers on the last column until the next character (`xenl`).
    pub eat_newline_glitch: bool,

    // Character sets
    /// UTF-8 output encoding.
    pub utf8: bool,
    /// DEC special graphics via `ESC ( 0`.
    pub alt_charset: bool,
    /// PC (CP437) glyphs via `CSI 11 m` (Linux console).
    pub pc_charset: bool,

    // Frame delivery
    /// Synchronized output (DEC mode 2026) to reduce flicker.
    pub sync_output: bool,

    // Multiplexer detection
    /// Running inside tmux.
    pub in_tmux: bool,
    /// Running inside GNU screen.
    pub in_screen: bool,
}

impl Default for TerminalCapabilities {
    fn default() -> Self {
        Self::basic()
    }
}

impl TerminalCapabilities {
    /// Get the profile identifier for this capability set.
    #[must_use]
    pub const fn profile(&self) -> TerminalProfile {
        self.profile
    }

    /// Get the profile name, or `None` for detected capabilities.
    #[must_use]
    pub fn profile_name(&self) -> Option<&'static str> {
        match self.profile {
            TerminalProfile::Detected => None,
            p => Some(p.as_str()),
        }
    }

    /// Create capabilities from a profile identifier.
    #[must_use]
    pub fn from_profile(profile: TerminalProfile) -> Self {
        match profile {
            TerminalProfile::Modern => Self::modern(),
            TerminalProfile::Xterm256Color => Self::xterm_256color(),
            TerminalProfile::Xterm => Self::xterm(),
            TerminalProfile::Vt100 => Self::vt100(),
            TerminalProfile::LinuxConsole => Self::linux_console(),
            TerminalProfile::Screen => Self::screen(),
            TerminalProfile::Tmux => Self::tmux(),
            TerminalProfile::Dumb => Self::dumb(),
            TerminalProfile::Custom => Self::basic(),
            TerminalProfile::Detected => Self::detect(),
        }
    }

    // ── Predefined Profiles ────────────────────────────────────────────

    /// Modern emulator: everything xterm-256color has plus DEC 2026.
    #[must_use]
    pub const fn modern() -> Self {
        let mut caps = Self::xterm_256color();
        caps.profile = TerminalProfile::Modern;
        caps.sync_output = true;
        caps
    }

    /// xterm with 256-color support.
    #[must_use]
    pub const fn xterm_256color() -> Self {
        Self {
            profile: TerminalProfile::Xterm256Color,
            ansi_colors: true,
            bright_colors: true,
            colors_256: true,
            background_color_erase: true,
            clear_eol: true,
            clear_bol: true,
            erase_chars: true,
            repeat_char: true,
            insert_character: true,
            auto_right_margin: true,
            auto_margin_toggle: true,
            eat_newline_glitch: true,
            utf8: true,
            alt_charset: true,
            pc_charset: false,
            sync_output: false,
            in_tmux: false,
            in_screen: false,
        }
    }

    /// Basic xterm with 16 colors only.
    #[must_use]
    pub const fn xterm() -> Self {
        let mut caps = Self::xterm_256color();
        caps.profile = TerminalProfile::Xterm;
        caps.colors_256 = false;
        caps
    }

    /// VT100: cursor addressing, line clears, and DEC graphics; no color.
    #[must_use]
    pub const fn vt100() -> Self {
        Self {
            profile: TerminalProfile::Vt100,
            ansi_colors: false,
            bright_colors: false,
            colors_256: false,
            background_color_erase: false,
            clear_eol: true,
            clear_bol: true,
            erase_chars: false,
            repeat_char: false,
            insert_character: false,
            auto_right_margin: true,
            auto_margin_toggle: true,
            eat_newline_glitch: true,
            utf8: false,
            alt_charset: true,
            pc_charset: false,
            sync_output: false,
            in_tmux: false,
            in_screen: false,
        }
    }

    /// Linux virtual console.
    #[must_use]
    pub const fn linux_console() -> Self {
        Self {
            profile: TerminalProfile::LinuxConsole,
            ansi_colors: true,
            bright_colors: false,
            colors_256: false,
            background_color_erase: true,
            clear_eol: true,
            clear_bol: true,
            erase_chars: true,
            repeat_char: false,
            insert_character: true,
            auto_right_margin: true,
            auto_margin_toggle: true,
            eat_newline_glitch: true,
            utf8: true,
            alt_charset: true,
            pc_charset: true,
            sync_output: false,
            in_tmux: false,
            in_screen: false,
        }
    }

    /// GNU Screen. No `bce` by default and no `REP`.
    #[must_use]
    pub const fn screen() -> Self {
        Self {
            profile: TerminalProfile::Screen,
            ansi_colors: true,
            bright_colors: true,
            colors_256: true,
            background_color_erase: false,
            clear_eol: true,
            clear_bol: true,
            erase_chars: true,
            repeat_char: false,
            insert_character: true,
            auto_right_margin: true,
            auto_margin_toggle: true,
            eat_newline_glitch: true,
            utf8: true,
            alt_charset: true,
            pc_charset: false,
            sync_output: false,
            in_tmux: false,
            in_screen: true,
        }
    }

    /// tmux multiplexer.
    #[must_use]
    pub const fn tmux() -> Self {
        let mut caps = Self::screen();
        caps.profile = TerminalProfile::Tmux;
        caps.background_color_erase = true;
        caps.in_screen = false;
        caps.in_tmux = true;
        caps
    }

    /// Dumb terminal with no capabilities.
    #[must_use]
    pub const fn dumb() -> Self {
        Self::basic()
    }

    /// Create a builder for custom capability profiles.
    #[must_use]
    pub fn builder() -> CapabilityProfileBuilder {
        CapabilityProfileBuilder::new()
    }
}

/// Builder for custom terminal capability profiles.
///
/// Starts with all capabilities disabled (including `auto_right_margin`).
///
/// ```
/// use vtstack_core::terminal_capabilities::CapabilityProfileBuilder;
///
/// let profile = CapabilityProfileBuilder::new()
///     .ansi_colors(true)
///     .erase_chars(true)
///     .build();
/// assert!(profile.erase_chars);
/// assert!(!profile.repeat_char);
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityProfileBuilder {
    caps: TerminalCapabilities,
}

impl Default for CapabilityProfileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProfileBuilder {
    /// Create a new builder with all capabilities disabled.
    #[must_use]
    pub fn new() -> Self {
        let mut caps = TerminalCapabilities::basic();
        caps.profile = TerminalProfile::Custom;
        caps.auto_right_margin = false;
        Self { caps }
    }

    /// Start from an existing profile.
    #[must_use]
    pub fn from_profile(profile: TerminalProfile) -> Self {
        let mut caps = TerminalCapabilities::from_profile(profile);
        caps.profile = TerminalProfile::Custom;
        Self { caps }
    }

    /// Build the final capability set.
    #[must_use]
    pub fn build(self) -> TerminalCapabilities {
        self.caps
    }

    // ── Color ──────────────────────────────────────────────────────────

    #[must_use]
    pub const fn ansi_colors(mut self, enabled: bool) -> Self {
        self.caps.ansi_colors = enabled;
        self
    }

    #[must_use]
    pub const fn bright_colors(mut self, enabled: bool) -> Self {
        self.caps.bright_colors = enabled;
        self
    }

    #[must_use]
    pub const fn colors_256(mut self, enabled: bool) -> Self {
        self.caps.colors_256 = enabled;
        self
    }

    #[must_use]
    pub const fn background_color_erase(mut self, enabled: bool) -> Self {
        self.caps.background_color_erase = enabled;
        self
    }

    // ── Optimization primitives ────────────────────────────────────────

    #[must_use]
    pub const fn clear_eol(mut self, enabled: bool) -> Self {
        self.caps.clear_eol = enabled;
        self
    }

    #[must_use]
    pub const fn clear_bol(mut self, enabled: bool) -> Self {
        self.caps.clear_bol = enabled;
        self
    }

    #[must_use]
    pub const fn erase_chars(mut self, enabled: bool) -> Self {
        self.caps.erase_chars = enabled;
        self
    }

    #[must_use]
    pub const fn repeat_char(mut self, enabled: bool) -> Self {
        self.caps.repeat_char = enabled;
        self
    }

    #[must_use]
    pub const fn insert_character(mut self, enabled: bool) -> Self {
        self.caps.insert_character = enabled;
        self
    }

    // ── Margins ────────────────────────────────────────────────────────

    #[must_use]
    pub const fn auto_right_margin(mut self, enabled: bool) -> Self {
        self.caps.auto_right_margin = enabled;
        self
    }

    #[must_use]
    pub const fn auto_margin_toggle(mut self, enabled: bool) -> Self {
        self.caps.auto_margin_toggle = enabled;
        self
    }

    #[must_use]
    pub const fn eat_newline_glitch(mut self, enabled: bool) -> Self {
        self.caps.eat_newline_glitch = enabled;
        self
    }

    // ── Character sets ─────────────────────────────────────────────────

    #[must_use]
    pub const fn utf8(mut self, enabled: bool) -> Self {
        self.caps.utf8 = enabled;
        self
    }

    #[must_use]
    pub const fn alt_charset(mut self, enabled: bool) -> Self {
        self.caps.alt_charset = enabled;
        self
    }

    #[must_use]
    pub const fn pc_charset(mut self, enabled: bool) -> Self {
        self.caps.pc_charset = enabled;
        self
    }

    // ── Delivery and multiplexers ──────────────────────────────────────

    #[must_use]
    pub const fn sync_output(mut self, enabled: bool) -> Self {
        self.caps.sync_output = enabled;
        self
    }

    #[must_use]
    pub const fn in_tmux(mut self, enabled: bool) -> Self {
        self.caps.in_tmux = enabled;
        self
    }

    #[must_use]
    pub const fn in_screen(mut self, enabled: bool) -> Self {
        self.caps.in_screen = enabled;
        self
    }
}

impl TerminalCapabilities {
    /// Detect terminal capabilities from the environment.
    ///
    /// When in doubt, capabilities are disabled.
    #[must_use]
    pub fn detect() -> Self {
        let env = DetectInputs::from_env();
        Self::detect_from_inputs(&env)
    }

    fn detect_from_inputs(env: &DetectInputs) -> Self {
        let term = env.term.as_str();
        let term_program = env.term_program.as_str();
        let colorterm = env.colorterm.as_str();
        let in_any_mux = env.in_tmux || env.in_screen;

        let is_dumb = term == "dumb" || term.is_empty();
        let is_linux = term.starts_with("linux");
        let is_vt100 = term.starts_with("vt1") || term.starts_with("vt2");
        let is_screen = term.starts_with("screen");
        let is_modern = MODERN_TERMINALS
            .iter()
            .any(|t| term_program.contains(t) || term.contains(&t.to_lowercase()));
        let is_xterm_like = term.starts_with("xterm") || is_modern;

        let ansi_colors = !env.no_color && !is_dumb && !is_vt100;
        let colors_256 = ansi_colors
            && (term.contains("256")
                || colorterm.contains("truecolor")
                || colorterm.contains("24bit")
                || is_modern);
        let bright_colors = ansi_colors && !is_linux;

        let locale = env.locale.to_uppercase();
        let utf8 = locale.contains("UTF-8") || locale.contains("UTF8");

        let sync_output = !is_dumb
            && (term.contains("kitty")
                || SYNC_OUTPUT_TERMINALS
                    .iter()
                    .any(|t| term_program.contains(t)));

        Self {
            profile: TerminalProfile::Detected,
            ansi_colors,
            bright_colors,
            colors_256,
            background_color_erase: !is_dumb && !is_vt100 && !is_screen,
            clear_eol: !is_dumb,
            clear_bol: !is_dumb,
            erase_chars: !is_dumb && !is_vt100,
            repeat_char: is_xterm_like && !in_any_mux,
            insert_character: !is_dumb && !is_vt100,
            auto_right_margin: true,
            auto_margin_toggle: !is_dumb,
            eat_newline_glitch: !is_dumb,
            utf8,
            alt_charset: !is_dumb,
            pc_charset: is_linux,
            sync_output,
            in_tmux: env.in_tmux,
            in_screen: env.in_screen,
        }
    }

    /// Create a minimal fallback capability set.
    ///
    /// Only `auto_right_margin` is assumed.
    #[must_use]
    pub const fn basic() -> Self {
        Self {
            profile: TerminalProfile::Dumb,
            ansi_colors: false,
            bright_colors: false,
            colors_256: false,
            background_color_erase: false,
            clear_eol: false,
            clear_bol: false,
            erase_chars: false,
            repeat_char: false,
            insert_character: false,
            auto_right_margin: true,
            auto_margin_toggle: false,
            eat_newline_glitch: false,
            utf8: false,
            alt_charset: false,
            pc_charset: false,
            sync_output: false,
            in_tmux: false,
            in_screen: false,
        }
    }

    /// Check if running inside any terminal multiplexer.
    #[must_use]
    #[inline]
    pub const fn in_any_mux(&self) -> bool {
        self.in_tmux || self.in_screen
    }

    /// Check if any color support is available.
    #[must_use]
    #[inline]
    pub const fn has_color(&self) -> bool {
        self.ansi_colors || self.colors_256
    }

    /// Number of palette entries the terminal can display (0 = monochrome).
    #[must_use]
    pub const fn color_count(&self) -> u16 {
        if self.colors_256 {
            256
        } else if self.ansi_colors && self.bright_colors {
            16
        } else if self.ansi_colors {
            8
        } else {
            0
        }
    }

    /// Whether synchronized output (DEC 2026) should be used.
    ///
    /// Disabled in multiplexers because passthrough is unreliable
    /// for mode-setting sequences.
    #[must_use]
    #[inline]
    pub const fn use_sync_output(&self) -> bool {
        if self.in_tmux || self.in_screen {
            return false;
        }
        self.sync_output
    }
}
