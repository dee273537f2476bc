use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::process::Command;

const TEMPLATES: &str = "templates";
const INPUT: &str = "assets/css/input.css";
const OUTPUT: &str = "assets/css/output.css";

/// Element rules written ahead of the utility classes.
const BASE: &str = "*, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: system-ui, -apple-system, sans-serif; line-height: 1.6; color: #1c1917; background: #fafaf9; }
a { color: inherit; text-decoration: none; }
a:hover { opacity: 0.8; }
input, textarea { font: inherit; padding-top: 0.25rem; padding-bottom: 0.25rem; }
article p, .card p { margin-bottom: 0.5rem; }
article hr { border: none; border-top: 1px dashed #d6d3d1; margin: 1rem 0; }
blockquote { border-left: 3px solid #d6d3d1; padding-left: 1rem; color: #57534e; }
pre, code { font-family: ui-monospace, monospace; font-size: 0.875rem; background: #f5f5f4; }
";

/// Declarations for every class the forum pages may use.
const RULES: &[(&str, &str)] = &[
    ("min-h-screen", "min-height: 100vh"),
    ("mx-auto", "margin-left: auto; margin-right: auto"),
    ("max-w-4xl", "max-width: 56rem"),
    ("max-w-xl", "max-width: 36rem"),
    ("max-w-md", "max-width: 28rem"),
    ("px-4", "padding-left: 1rem; padding-right: 1rem"),
    ("py-3", "padding-top: 0.75rem; padding-bottom: 0.75rem"),
    ("py-8", "padding-top: 2rem; padding-bottom: 2rem"),
    ("mb-1", "margin-bottom: 0.25rem"),
    ("mb-2", "margin-bottom: 0.5rem"),
    ("mb-4", "margin-bottom: 1rem"),
    ("ml-2", "margin-left: 0.5rem"),
    ("ml-auto", "margin-left: auto"),
    ("mt-1", "margin-top: 0.25rem"),
    ("mt-16", "margin-top: 4rem"),
    ("flex", "display: flex"),
    ("items-center", "align-items: center"),
    ("justify-center", "justify-content: center"),
    ("justify-between", "justify-content: space-between"),
    ("gap-3", "gap: 0.75rem"),
    ("gap-4", "gap: 1rem"),
    ("text-center", "text-align: center"),
    ("text-xs", "font-size: 0.75rem"),
    ("text-sm", "font-size: 0.875rem"),
    ("text-lg", "font-size: 1.125rem"),
    ("text-xl", "font-size: 1.25rem"),
    ("font-medium", "font-weight: 500"),
    ("font-semibold", "font-weight: 600"),
    ("font-bold", "font-weight: 700"),
    ("text-stone-400", "color: #a8a29e"),
    ("text-stone-500", "color: #78716c"),
    ("text-stone-600", "color: #57534e"),
    ("text-stone-700", "color: #44403c"),
    ("text-stone-900", "color: #1c1917"),
    ("bg-white", "background-color: #fff"),
    ("bg-stone-50", "background-color: #fafaf9"),
    ("bg-stone-200", "background-color: #e7e5e4"),
    ("bg-stone-900", "background-color: #1c1917"),
    ("border", "border: 1px solid"),
    ("border-b", "border-bottom: 1px solid"),
    ("border-t", "border-top: 1px solid"),
    ("border-stone-100", "border-color: #f5f5f4"),
    ("border-stone-200", "border-color: #e7e5e4"),
    ("border-stone-300", "border-color: #d6d3d1"),
    ("rounded-lg", "border-radius: 0.5rem"),
    ("rounded-full", "border-radius: 9999px"),
    ("btn", "display: inline-flex; align-items: center; justify-content: center; padding: 0.5rem 1rem; border-radius: 0.5rem; font-size: 0.875rem; font-weight: 500; cursor: pointer"),
    ("btn-primary", "background: #1c1917; color: #fff; border: none"),
    ("btn-secondary", "background: #fff; color: #1c1917; border: 1px solid #d6d3d1"),
    ("card", "background: #fff; border-radius: 0.75rem; border: 1px solid #e7e5e4; padding: 1.5rem"),
];

fn main() {
    println!("cargo:rerun-if-changed={}", INPUT);
    println!("cargo:rerun-if-changed={}", TEMPLATES);

    let status = Command::new("tailwindcss")
        .args(["-i", INPUT, "-o", OUTPUT, "--minify"])
        .status();
    if matches!(status, Ok(s) if s.success()) {
        println!("cargo:warning=Tailwind CSS compiled successfully");
        return;
    }

    println!("cargo:warning=Tailwind CLI not found, generating fallback CSS from templates");
    let used = template_classes(Path::new(TEMPLATES));
    for class in used.iter().filter(|c| !RULES.iter().any(|(name, _)| name == *c)) {
        println!("cargo:warning=No fallback rule for class `{}`", class);
    }

    let mut css = String::from(BASE);
    for (name, declarations) in RULES.iter().filter(|(name, _)| used.contains(*name)) {
        css.push_str(&format!(".{} {{ {}; }}\n", name, declarations));
    }
    if let Some(dir) = Path::new(OUTPUT).parent() {
        fs::create_dir_all(dir).ok();
    }
    if let Err(e) = fs::write(OUTPUT, css) {
        println!("cargo:warning=Cannot write {}: {}", OUTPUT, e);
    }
}

/// Class names appearing in `class="..."` attributes, skipping template
/// expressions.
fn template_classes(dir: &Path) -> BTreeSet<String> {
    let mut classes = BTreeSet::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return classes;
    };
    for entry in entries.flatten() {
        let Ok(source) = fs::read_to_string(entry.path()) else {
            continue;
        };
        for attribute in source.split("class=\"").skip(1) {
            let value = attribute.split('"').next().unwrap_or_default();
            classes.extend(strip_tags(value).split_whitespace().map(str::to_string));
        }
    }
    classes
}

/// Drops `{% ... %}` and `{{ ... }}` blocks so only literal text is left.
fn strip_tags(value: &str) -> String {
    let mut text = String::new();
    let mut rest = value;
    while let Some(start) = rest.find('{') {
        text.push_str(&rest[..start]);
        let close = match rest[start..].get(1..2) {
            Some("%") => "%}",
            Some("{") => "}}",
            _ => {
                text.push('{');
                rest = &rest[start + 1..];
                continue;
            }
        };
        match rest[start..].find(close) {
            Some(end) => {
                text.push(' ');
                rest = &rest[start + end + close.len()..];
            }
            None => return text,
        }
    }
    text.push_str(rest);
    text
}
