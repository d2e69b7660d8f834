use ratatui::style::Color;

/// All themeable colors in the application
#[derive(Clone, Debug)]
pub struct Theme {
    // Log levels
    pub level_error: Color,
    pub level_warn: Color,
    pub level_info: Color,
    pub level_debug: Color,
    pub level_trace: Color,

    // UI borders
    pub border_focused: Color,
    pub border_unfocused: Color,

    // Header
    pub header_title: Color,
    pub header_source: Color,
    pub header_bg: Color,

    // Status bar
    pub status_mode_bg: Color,
    pub status_mode_fg: Color,
    pub status_help: Color,
    pub status_bg: Color,
    pub status_stale: Color,

    // Search highlights
    pub match_bg: Color,
    pub match_fg: Color,
    pub active_match_bg: Color,
    pub active_match_fg: Color,

    // Jump flash and text selection
    pub flash_bg: Color,
    pub selection_bg: Color,

    // "N new lines" badge
    pub badge_bg: Color,
    pub badge_fg: Color,

    // Side panels
    pub source_current: Color,
    pub source_selected: Color,
    pub line_number: Color,

    // Empty states / messages
    pub empty_state: Color,
    pub warning_message: Color,

    // Help overlay
    pub help_border: Color,
    pub help_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    pub fn default_theme() -> Self {
        Self {
            level_error: Color::Red,
            level_warn: Color::Yellow,
            level_info: Color::Green,
            level_debug: Color::Blue,
            level_trace: Color::DarkGray,

            border_focused: Color::Cyan,
            border_unfocused: Color::DarkGray,

            header_title: Color::Green,
            header_source: Color::Cyan,
            header_bg: Color::DarkGray,

            status_mode_bg: Color::Blue,
            status_mode_fg: Color::White,
            status_help: Color::DarkGray,
            status_bg: Color::Black,
            status_stale: Color::Red,

            match_bg: Color::Yellow,
            match_fg: Color::Black,
            active_match_bg: Color::LightRed,
            active_match_fg: Color::Black,

            flash_bg: Color::Rgb(60, 60, 90),
            selection_bg: Color::Rgb(40, 70, 110),

            badge_bg: Color::Magenta,
            badge_fg: Color::White,

            source_current: Color::Green,
            source_selected: Color::Yellow,
            line_number: Color::DarkGray,

            empty_state: Color::DarkGray,
            warning_message: Color::Yellow,

            help_border: Color::Cyan,
            help_bg: Color::Black,
        }
    }

    /// Neon on dark
    pub fn cyber() -> Self {
        Self {
            level_error: Color::Rgb(255, 50, 100),
            level_warn: Color::Rgb(255, 200, 0),
            level_info: Color::Rgb(0, 255, 150),
            level_debug: Color::Rgb(0, 200, 255),
            level_trace: Color::Rgb(100, 100, 120),

            border_focused: Color::Rgb(0, 255, 255),
            border_unfocused: Color::Rgb(60, 60, 80),

            header_title: Color::Rgb(255, 0, 255),
            header_source: Color::Rgb(0, 255, 255),
            header_bg: Color::Rgb(20, 20, 35),

            status_mode_bg: Color::Rgb(255, 0, 255),
            status_mode_fg: Color::Rgb(0, 0, 0),
            status_help: Color::Rgb(100, 100, 120),
            status_bg: Color::Rgb(10, 10, 20),
            status_stale: Color::Rgb(255, 50, 100),

            match_bg: Color::Rgb(0, 255, 255),
            match_fg: Color::Rgb(0, 0, 0),
            active_match_bg: Color::Rgb(255, 0, 255),
            active_match_fg: Color::Rgb(0, 0, 0),

            flash_bg: Color::Rgb(40, 0, 60),
            selection_bg: Color::Rgb(0, 60, 80),

            badge_bg: Color::Rgb(255, 0, 255),
            badge_fg: Color::Rgb(0, 0, 0),

            source_current: Color::Rgb(0, 255, 150),
            source_selected: Color::Rgb(255, 200, 0),
            line_number: Color::Rgb(100, 100, 120),

            empty_state: Color::Rgb(100, 100, 120),
            warning_message: Color::Rgb(255, 200, 0),

            help_border: Color::Rgb(0, 255, 255),
            help_bg: Color::Rgb(10, 10, 20),
        }
    }

    /// Dracula palette
    pub fn dracula() -> Self {
        Self {
            level_error: Color::Rgb(255, 85, 85),
            level_warn: Color::Rgb(255, 184, 108),
            level_info: Color::Rgb(80, 250, 123),
            level_debug: Color::Rgb(139, 233, 253),
            level_trace: Color::Rgb(98, 114, 164),

            border_focused: Color::Rgb(189, 147, 249),
            border_unfocused: Color::Rgb(68, 71, 90),

            header_title: Color::Rgb(255, 121, 198),
            header_source: Color::Rgb(139, 233, 253),
            header_bg: Color::Rgb(40, 42, 54),

            status_mode_bg: Color::Rgb(189, 147, 249),
            status_mode_fg: Color::Rgb(40, 42, 54),
            status_help: Color::Rgb(98, 114, 164),
            status_bg: Color::Rgb(33, 34, 44),
            status_stale: Color::Rgb(255, 85, 85),

            match_bg: Color::Rgb(241, 250, 140),
            match_fg: Color::Rgb(40, 42, 54),
            active_match_bg: Color::Rgb(255, 121, 198),
            active_match_fg: Color::Rgb(40, 42, 54),

            flash_bg: Color::Rgb(68, 71, 90),
            selection_bg: Color::Rgb(68, 71, 90),

            badge_bg: Color::Rgb(255, 121, 198),
            badge_fg: Color::Rgb(40, 42, 54),

            source_current: Color::Rgb(80, 250, 123),
            source_selected: Color::Rgb(241, 250, 140),
            line_number: Color::Rgb(98, 114, 164),

            empty_state: Color::Rgb(98, 114, 164),
            warning_message: Color::Rgb(255, 184, 108),

            help_border: Color::Rgb(189, 147, 249),
            help_bg: Color::Rgb(40, 42, 54),
        }
    }

    /// Grayscale only; matches stand out by contrast
    pub fn monochrome() -> Self {
        Self {
            level_error: Color::Rgb(255, 255, 255),
            level_warn: Color::Rgb(200, 200, 200),
            level_info: Color::Rgb(170, 170, 170),
            level_debug: Color::Rgb(140, 140, 140),
            level_trace: Color::Rgb(100, 100, 100),

            border_focused: Color::Rgb(200, 200, 200),
            border_unfocused: Color::Rgb(80, 80, 80),

            header_title: Color::Rgb(255, 255, 255),
            header_source: Color::Rgb(180, 180, 180),
            header_bg: Color::Rgb(50, 50, 50),

            status_mode_bg: Color::Rgb(200, 200, 200),
            status_mode_fg: Color::Rgb(0, 0, 0),
            status_help: Color::Rgb(120, 120, 120),
            status_bg: Color::Rgb(30, 30, 30),
            status_stale: Color::Rgb(255, 255, 255),

            match_bg: Color::Rgb(170, 170, 170),
            match_fg: Color::Rgb(0, 0, 0),
            active_match_bg: Color::Rgb(255, 255, 255),
            active_match_fg: Color::Rgb(0, 0, 0),

            flash_bg: Color::Rgb(70, 70, 70),
            selection_bg: Color::Rgb(60, 60, 60),

            badge_bg: Color::Rgb(200, 200, 200),
            badge_fg: Color::Rgb(0, 0, 0),

            source_current: Color::Rgb(255, 255, 255),
            source_selected: Color::Rgb(200, 200, 200),
            line_number: Color::Rgb(100, 100, 100),

            empty_state: Color::Rgb(120, 120, 120),
            warning_message: Color::Rgb(200, 200, 200),

            help_border: Color::Rgb(180, 180, 180),
            help_bg: Color::Rgb(20, 20, 20),
        }
    }

    /// Get a theme by name; unknown names fall back to the default
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "cyber" | "futuristic" => Self::cyber(),
            "monochrome" | "mono" => Self::monochrome(),
            "dracula" => Self::dracula(),
            _ => Self::default_theme(),
        }
    }
}
