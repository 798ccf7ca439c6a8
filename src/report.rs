use tzcompiler::CompileOutput;
use tzcompiler::types::CommentsMap;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// Print a compact summary of a run to stderr.
pub fn print_summary(out: &CompileOutput, color: bool) {
    let palette = ansi::Palette::new(color);
    let ctx = &out.database.context;

    eprintln!(
        "\n{}",
        palette.bold(palette.paint(
            format!("⚙  tzdb {} → {} scope [{}, {})", display_version(&ctx.tz_version), ctx.scope, ctx.start_year, ctx.until_year),
            ansi::CYAN
        ))
    );

    eprintln!("\n{}", palette.paint("━━━ Database ━━━", ansi::GRAY));
    let counts = ctx.counts;
    eprintln!(
        "  {} {}  {} {}  {} {}  {} {}  {} {}",
        palette.dim("zones:"),
        palette.paint(counts.zones.to_string(), ansi::GREEN),
        palette.dim("eras:"),
        palette.paint(counts.eras.to_string(), ansi::GREEN),
        palette.dim("links:"),
        palette.paint(counts.links.to_string(), ansi::GREEN),
        palette.dim("policies:"),
        palette.paint(counts.policies.to_string(), ansi::GREEN),
        palette.dim("rules:"),
        palette.paint(counts.rules.to_string(), ansi::GREEN),
    );
    eprintln!(
        "  {} {}  {} {}  {} {}",
        palette.dim("letters:"),
        palette.paint(out.database.letters.len().to_string(), ansi::BLUE),
        palette.dim("formats:"),
        palette.paint(out.database.formats.len().to_string(), ansi::BLUE),
        palette.dim("fragments:"),
        palette.paint(out.database.fragments.len().to_string(), ansi::BLUE),
    );
    eprintln!(
        "  {} [{}, {})  {} lower={} upper={}",
        palette.dim("accurate:"),
        ctx.start_year_accurate,
        ctx.until_year_accurate,
        palette.dim("truncated:"),
        ctx.lower_truncated,
        ctx.upper_truncated,
    );

    eprintln!("\n{}", palette.paint("━━━ Buffer size ━━━", ansi::GRAY));
    let peak = ctx.buffer_sizes.iter().filter(|(_, size)| size.max == ctx.max_buffer_size).collect::<Vec<_>>();
    eprintln!(
        "  {} {}  {}",
        palette.dim("max:"),
        palette.bold(palette.paint(ctx.max_buffer_size.to_string(), ansi::GREEN)),
        palette.dim(format!("reached by {} zones", peak.len())),
    );
    for (zone, size) in peak.iter().take(5) {
        eprintln!("    {} {}", palette.paint(zone.as_str(), ansi::BLUE), palette.dim(format!("in {}", size.year)));
    }
    if peak.len() > 5 {
        eprintln!("    {}", palette.dim(format!("... +{} more", peak.len() - 5)));
    }

    eprintln!("\n{}", palette.paint("━━━ Comments ━━━", ansi::GRAY));
    let comments = &out.database.comments;
    print_comment_count(&palette, "removed zones", &comments.removed_zones);
    print_comment_count(&palette, "removed policies", &comments.removed_policies);
    print_comment_count(&palette, "removed links", &comments.removed_links);
    print_comment_count(&palette, "notable zones", &comments.notable_zones);
    print_comment_count(&palette, "notable policies", &comments.notable_policies);

    eprintln!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    let stages = out
        .metrics
        .stages()
        .iter()
        .map(|(name, stage)| format!("{}: {}", name, palette.paint(format!("{:?}", stage.duration), ansi::CYAN)))
        .collect::<Vec<_>>()
        .join("  │  ");
    eprintln!("  Total: {}  │  {}", palette.paint(format!("{:?}", out.metrics.total), ansi::GREEN), stages);
    eprintln!();
}

fn print_comment_count(palette: &ansi::Palette, label: &str, map: &CommentsMap) {
    let count = if map.is_empty() { palette.dim("0") } else { palette.paint(map.len().to_string(), ansi::YELLOW) };
    eprintln!("  {} {}", palette.dim(format!("{label}:")), count);
}

fn display_version(tag: &str) -> &str {
    if tag.is_empty() { "(unversioned)" } else { tag }
}
