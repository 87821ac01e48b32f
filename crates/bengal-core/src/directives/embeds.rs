//! Media and code embed directives.
//!
//! Each embed validates its identifier or path and renders a visible error
//! div instead of the embed when validation fails; a missing required
//! `:title:` (accessibility) takes the same error path. Embeds never fail
//! the build.

use crate::ast::AstNode;

use super::{
    DirectiveContract, DirectiveHandler, DirectiveInvocation, FieldSpec, OptionsSpec,
};

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn escape_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

fn push_param(query: &mut String, param: &str) {
    query.push('&');
    query.push_str(param);
}

/// `youtube`: privacy-enhanced YouTube iframe embed.
pub struct YouTubeDirective;

static YOUTUBE_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "youtube",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::bool("privacy"),
        FieldSpec::int("start"),
        FieldSpec::int("end"),
        FieldSpec::bool("autoplay"),
        FieldSpec::bool("loop"),
        FieldSpec::bool("controls"),
        FieldSpec::str("aspect"),
    ],
};

fn valid_youtube_id(id: &str) -> bool {
    id.len() == 11
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl DirectiveHandler for YouTubeDirective {
    fn names(&self) -> &'static [&'static str] {
        &["youtube"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = YOUTUBE_OPTIONS.parse(inv.options);
        let id = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "video",
                "Missing required :title: option for YouTube embed (accessibility)",
            );
        };
        if !valid_youtube_id(id) {
            return inv.error_div("video", &format!("Invalid YouTube video ID: {id}"));
        }
        let host = if opts.bool_or("privacy", true) {
            "www.youtube-nocookie.com"
        } else {
            "www.youtube.com"
        };
        let mut query = String::from("rel=0");
        let start = opts.int_or("start", 0);
        if start > 0 {
            push_param(&mut query, &format!("start={start}"));
        }
        let end = opts.int_or("end", 0);
        if end > 0 {
            push_param(&mut query, &format!("end={end}"));
        }
        if opts.bool_or("autoplay", false) {
            // Browsers require muted playback for autoplay.
            push_param(&mut query, "autoplay=1");
            push_param(&mut query, "mute=1");
        }
        if opts.bool_or("loop", false) {
            push_param(&mut query, "loop=1");
            push_param(&mut query, &format!("playlist={id}"));
        }
        if !opts.bool_or("controls", true) {
            push_param(&mut query, "controls=0");
        }
        let aspect = opts.str_or("aspect", "16/9");
        vec![inv.html(format!(
            "<div class=\"video-embed youtube\" data-aspect=\"{aspect}\">\n\
             <iframe src=\"https://{host}/embed/{id}?{query}\" title=\"{title}\" \
             loading=\"lazy\" allowfullscreen \
             allow=\"accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture\">\
             </iframe>\n\
             <noscript><a href=\"https://www.youtube.com/watch?v={id}\">Watch on YouTube</a></noscript>\n\
             </div>\n",
            aspect = escape_attr(aspect),
            title = escape_attr(title),
        ))]
    }
}

/// `vimeo`: privacy-aware Vimeo iframe embed.
pub struct VimeoDirective;

static VIMEO_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "vimeo",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::bool("privacy"),
        FieldSpec::str("color"),
        FieldSpec::bool("background"),
    ],
};

impl DirectiveHandler for VimeoDirective {
    fn names(&self) -> &'static [&'static str] {
        &["vimeo"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = VIMEO_OPTIONS.parse(inv.options);
        let id = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "video",
                "Missing required :title: option for Vimeo embed (accessibility)",
            );
        };
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return inv.error_div("video", &format!("Invalid Vimeo video ID: {id}"));
        }
        let mut query = String::new();
        if opts.bool_or("privacy", true) {
            query.push_str("dnt=1");
        }
        if let Some(color) = opts.str_opt("color") {
            let color = color.trim_start_matches('#');
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&format!("color={color}"));
        }
        if opts.bool_or("background", false) {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str("background=1");
        }
        let sep = if query.is_empty() { "" } else { "?" };
        vec![inv.html(format!(
            "<div class=\"video-embed vimeo\" data-aspect=\"16/9\">\n\
             <iframe src=\"https://player.vimeo.com/video/{id}{sep}{query}\" title=\"{title}\" \
             loading=\"lazy\" allowfullscreen allow=\"autoplay; fullscreen; picture-in-picture\"></iframe>\n\
             </div>\n",
            title = escape_attr(title),
        ))]
    }
}

/// `video`: self-hosted video file.
pub struct VideoDirective;

static VIDEO_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "video",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::str("poster"),
        FieldSpec::bool("autoplay"),
        FieldSpec::bool("loop"),
        FieldSpec::bool("controls"),
    ],
};

fn video_mime(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "ogg" | "ogv" => Some("video/ogg"),
        _ => None,
    }
}

impl DirectiveHandler for VideoDirective {
    fn names(&self) -> &'static [&'static str] {
        &["video"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = VIDEO_OPTIONS.parse(inv.options);
        let path = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "video",
                "Missing required :title: option for video embed (accessibility)",
            );
        };
        let Some(mime) = video_mime(path) else {
            return inv.error_div("video", &format!("Invalid video path: {path}"));
        };
        let mut attrs = String::new();
        if opts.bool_or("controls", true) {
            attrs.push_str(" controls");
        }
        if opts.bool_or("autoplay", false) {
            attrs.push_str(" autoplay muted playsinline");
        }
        if opts.bool_or("loop", false) {
            attrs.push_str(" loop");
        }
        if let Some(poster) = opts.str_opt("poster") {
            attrs.push_str(&format!(" poster=\"{}\"", escape_attr(poster)));
        }
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"video-embed self-hosted\">\n\
             <video title=\"{title}\"{attrs} preload=\"metadata\">\n\
             <source src=\"{src}\" type=\"{mime}\">\n",
            title = escape_attr(title),
            src = escape_attr(path),
        )));
        // Body content is the no-support fallback (e.g. a download link).
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</video>\n</div>\n"));
        nodes
    }
}

/// `gist`: GitHub gist script embed.
pub struct GistDirective;

static GIST_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "gist",
    fields: &[FieldSpec::str("file")],
};

fn valid_gist_ref(reference: &str) -> bool {
    let mut parts = reference.splitn(2, '/');
    let (Some(user), Some(id)) = (parts.next(), parts.next()) else {
        return false;
    };
    !user.is_empty()
        && !id.is_empty()
        && user
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl DirectiveHandler for GistDirective {
    fn names(&self) -> &'static [&'static str] {
        &["gist"]
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = GIST_OPTIONS.parse(inv.options);
        let reference = inv.title.unwrap_or("").trim();
        if !valid_gist_ref(reference) {
            return inv.error_div("gist", &format!("Invalid gist reference: {reference}"));
        }
        let file_query = opts
            .str_opt("file")
            .map(|f| format!("?file={}", escape_attr(f)))
            .unwrap_or_default();
        vec![inv.html(format!(
            "<div class=\"gist-embed\">\n\
             <script src=\"https://gist.github.com/{reference}.js{file_query}\"></script>\n\
             <noscript>View gist: <a href=\"https://gist.github.com/{reference}\">gist.github.com/{reference}</a></noscript>\n\
             </div>\n"
        ))]
    }
}

/// `codepen`: CodePen iframe embed.
pub struct CodePenDirective;

static CODEPEN_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "codepen",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::str("default_tab").aliased("default-tab"),
        FieldSpec::int("height"),
    ],
};

impl DirectiveHandler for CodePenDirective {
    fn names(&self) -> &'static [&'static str] {
        &["codepen"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = CODEPEN_OPTIONS.parse(inv.options);
        let reference = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "code",
                "Missing required :title: option for CodePen embed (accessibility)",
            );
        };
        let mut parts = reference.splitn(2, '/');
        let (Some(user), Some(pen)) = (parts.next(), parts.next()) else {
            return inv.error_div("code", &format!("Invalid CodePen reference: {reference}"));
        };
        if user.is_empty() || pen.is_empty() {
            return inv.error_div("code", &format!("Invalid CodePen reference: {reference}"));
        }
        let tab = opts.str_or("default_tab", "result");
        let height = opts.int_or("height", 400).max(100);
        vec![inv.html(format!(
            "<div class=\"code-embed codepen\" style=\"height: {height}px\">\n\
             <iframe src=\"https://codepen.io/{user}/embed/{pen}?default-tab={tab}\" \
             title=\"{title}\" loading=\"lazy\" allowfullscreen></iframe>\n\
             </div>\n",
            tab = escape_attr(tab),
            title = escape_attr(title),
        ))]
    }
}

/// `codesandbox`: CodeSandbox iframe embed.
pub struct CodeSandboxDirective;

static CODESANDBOX_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "codesandbox",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::str("module"),
        FieldSpec::str("view"),
    ],
};

impl DirectiveHandler for CodeSandboxDirective {
    fn names(&self) -> &'static [&'static str] {
        &["codesandbox"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = CODESANDBOX_OPTIONS.parse(inv.options);
        let id = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "code",
                "Missing required :title: option for CodeSandbox embed (accessibility)",
            );
        };
        if id.is_empty() || id.contains(char::is_whitespace) {
            return inv.error_div("code", &format!("Invalid CodeSandbox id: {id}"));
        }
        let mut query = String::new();
        if let Some(module) = opts.str_opt("module") {
            query.push_str(&format!("module={}", escape_attr(module)));
        }
        if let Some(view) = opts.str_opt("view") {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&format!("view={}", escape_attr(view)));
        }
        let sep = if query.is_empty() { "" } else { "?" };
        vec![inv.html(format!(
            "<div class=\"code-embed codesandbox\">\n\
             <iframe src=\"https://codesandbox.io/embed/{id}{sep}{query}\" title=\"{title}\" \
             loading=\"lazy\" allowfullscreen sandbox=\"allow-scripts allow-same-origin\"></iframe>\n\
             </div>\n",
            title = escape_attr(title),
        ))]
    }
}

/// `stackblitz`: StackBlitz iframe embed.
pub struct StackBlitzDirective;

static STACKBLITZ_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "stackblitz",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::str("file"),
        FieldSpec::str("view"),
    ],
};

impl DirectiveHandler for StackBlitzDirective {
    fn names(&self) -> &'static [&'static str] {
        &["stackblitz"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = STACKBLITZ_OPTIONS.parse(inv.options);
        let id = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "code",
                "Missing required :title: option for StackBlitz embed (accessibility)",
            );
        };
        if id.is_empty() || id.contains(char::is_whitespace) {
            return inv.error_div("code", &format!("Invalid StackBlitz id: {id}"));
        }
        let mut query = String::from("embed=1");
        if let Some(file) = opts.str_opt("file") {
            push_param(&mut query, &format!("file={}", escape_attr(file)));
        }
        if let Some(view) = opts.str_opt("view") {
            push_param(&mut query, &format!("view={}", escape_attr(view)));
        }
        vec![inv.html(format!(
            "<div class=\"code-embed stackblitz\">\n\
             <iframe src=\"https://stackblitz.com/edit/{id}?{query}\" title=\"{title}\" \
             loading=\"lazy\" allowfullscreen></iframe>\n\
             </div>\n",
            title = escape_attr(title),
        ))]
    }
}

/// `asciinema`: terminal recording embed.
pub struct AsciinemaDirective;

static ASCIINEMA_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "asciinema",
    // Raw string passthrough so values land verbatim in data attributes
    // (the player expects e.g. "2.0" and "true" as written).
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::str("cols"),
        FieldSpec::str("rows"),
        FieldSpec::str("speed"),
        FieldSpec::str("autoplay"),
        FieldSpec::str("loop"),
        FieldSpec::str("theme"),
    ],
};

impl DirectiveHandler for AsciinemaDirective {
    fn names(&self) -> &'static [&'static str] {
        &["asciinema"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = ASCIINEMA_OPTIONS.parse(inv.options);
        let id = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "terminal",
                "Missing required :title: option for Asciinema embed (accessibility)",
            );
        };
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return inv.error_div("terminal", &format!("Invalid Asciinema recording ID: {id}"));
        }
        let mut data = String::new();
        for key in ["cols", "rows", "speed", "autoplay", "loop", "theme"] {
            if let Some(value) = opts.str_opt(key) {
                data.push_str(&format!(" data-{key}=\"{}\"", escape_attr(value)));
            }
        }
        vec![inv.html(format!(
            "<div class=\"terminal-embed asciinema\" role=\"img\" aria-label=\"{title}\">\n\
             <script src=\"https://asciinema.org/a/{id}.js\" id=\"asciicast-{id}\" async{data}></script>\n\
             <noscript>View recording: <a href=\"https://asciinema.org/a/{id}\">asciinema.org/a/{id}</a></noscript>\n\
             </div>\n",
            title = escape_attr(title),
        ))]
    }
}

/// `figure`: image with caption, alignment, and optional link.
pub struct FigureDirective;

static FIGURE_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "figure",
    fields: &[
        FieldSpec::str("alt"),
        FieldSpec::str("caption"),
        FieldSpec::choice("align", &["left", "center", "right"]),
        FieldSpec::str("width"),
        FieldSpec::str("link"),
        FieldSpec::str("target"),
    ],
};

fn valid_image_path(path: &str) -> bool {
    let Some(ext) = path.rsplit('.').next() else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif"
    )
}

impl DirectiveHandler for FigureDirective {
    fn names(&self) -> &'static [&'static str] {
        &["figure"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["alt"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = FIGURE_OPTIONS.parse(inv.options);
        let src = inv.title.unwrap_or("").trim();
        // Empty alt marks a decorative image, so presence is what matters.
        let Some(alt) = opts.str_present("alt") else {
            return inv.error_div(
                "figure",
                "Missing required :alt: option for figure (accessibility)",
            );
        };
        if !valid_image_path(src) {
            return inv.error_div("figure", &format!("Invalid image path: {src}"));
        }
        let mut classes = String::from("figure");
        if let Some(align) = opts.str_opt("align") {
            classes.push_str(&format!(" align-{align}"));
        }
        let style = opts
            .str_opt("width")
            .map(|w| format!(" style=\"width: {}\"", escape_attr(w)))
            .unwrap_or_default();
        let img = format!(
            "<img src=\"{}\" alt=\"{}\" loading=\"lazy\">",
            escape_attr(src),
            escape_attr(alt)
        );
        let body = match opts.str_opt("link") {
            Some(link) => {
                let target = if opts.str_or("target", "") == "_blank" {
                    " target=\"_blank\" rel=\"noopener noreferrer\""
                } else {
                    ""
                };
                format!("<a href=\"{}\"{target}>{img}</a>", escape_attr(link))
            }
            None => img,
        };
        let caption = opts
            .str_opt("caption")
            .map(|c| format!("\n<figcaption>{}</figcaption>", escape(c)))
            .unwrap_or_default();
        vec![inv.html(format!(
            "<figure class=\"{classes}\"{style}>\n{body}{caption}\n</figure>\n"
        ))]
    }
}

/// `audio`: self-hosted audio file.
pub struct AudioDirective;

static AUDIO_OPTIONS: OptionsSpec = OptionsSpec {
    directive: "audio",
    fields: &[
        FieldSpec::str("title"),
        FieldSpec::bool("controls"),
        FieldSpec::bool("autoplay"),
        FieldSpec::bool("loop"),
    ],
};

fn audio_mime(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => Some("audio/mpeg"),
        "ogg" | "oga" => Some("audio/ogg"),
        "wav" => Some("audio/wav"),
        "m4a" => Some("audio/mp4"),
        "flac" => Some("audio/flac"),
        _ => None,
    }
}

impl DirectiveHandler for AudioDirective {
    fn names(&self) -> &'static [&'static str] {
        &["audio"]
    }

    fn contract(&self) -> Option<DirectiveContract> {
        Some(DirectiveContract {
            required_options: &["title"],
            ..DirectiveContract::default()
        })
    }

    fn expand(&self, inv: &DirectiveInvocation<'_>) -> Vec<AstNode> {
        let opts = AUDIO_OPTIONS.parse(inv.options);
        let path = inv.title.unwrap_or("").trim();
        let Some(title) = opts.str_opt("title") else {
            return inv.error_div(
                "audio",
                "Missing required :title: option for audio embed (accessibility)",
            );
        };
        let Some(mime) = audio_mime(path) else {
            return inv.error_div("audio", &format!("Invalid audio path: {path}"));
        };
        let mut attrs = String::new();
        if opts.bool_or("controls", true) {
            attrs.push_str(" controls");
        }
        if opts.bool_or("autoplay", false) {
            attrs.push_str(" autoplay");
        }
        if opts.bool_or("loop", false) {
            attrs.push_str(" loop");
        }
        let mut nodes = Vec::with_capacity(inv.children.len() + 2);
        nodes.push(inv.html(format!(
            "<div class=\"audio-embed\">\n\
             <audio title=\"{title}\"{attrs} preload=\"metadata\">\n\
             <source src=\"{src}\" type=\"{mime}\">\n",
            title = escape_attr(title),
            src = escape_attr(path),
        )));
        nodes.extend_from_slice(inv.children);
        nodes.push(inv.html("</audio>\n</div>\n"));
        nodes
    }
}
