//! Programming-language classification for snapshot files.
//!
//! Classification runs in two stages. The file name is checked first against
//! well-known file names (`Dockerfile`, `Makefile`, ...) and then against an
//! extension table. When the name says nothing, or names an extension shared
//! by several languages, the content is inspected: shebang lines, editor
//! modelines, and a handful of strong leading signatures.
//!
//! Labels follow GitHub Linguist naming (`"Go"`, `"HCL"`, `"Dockerfile"`).

use std::path::Path;

/// Known file names, matched case-sensitively against the last path segment.
const FILENAMES: &[(&str, &str)] = &[
    ("Dockerfile", "Dockerfile"),
    ("dockerfile", "Dockerfile"),
    ("Containerfile", "Dockerfile"),
    ("Makefile", "Makefile"),
    ("makefile", "Makefile"),
    ("GNUmakefile", "Makefile"),
    ("CMakeLists.txt", "CMake"),
    ("Jenkinsfile", "Groovy"),
    ("Vagrantfile", "Ruby"),
    ("Gemfile", "Ruby"),
    ("Rakefile", "Ruby"),
    ("Podfile", "Ruby"),
    ("Brewfile", "Ruby"),
    ("Justfile", "Just"),
    ("justfile", "Just"),
    ("BUILD", "Starlark"),
    ("BUILD.bazel", "Starlark"),
    ("WORKSPACE", "Starlark"),
    ("go.mod", "Go Module"),
    ("go.sum", "Go Checksums"),
    ("Cargo.lock", "TOML"),
    ("Pipfile", "TOML"),
    ("Pipfile.lock", "JSON"),
    (".gitignore", "Ignore List"),
    (".dockerignore", "Ignore List"),
    (".gitattributes", "Git Attributes"),
    (".editorconfig", "EditorConfig"),
    (".bashrc", "Shell"),
    (".bash_profile", "Shell"),
    (".zshrc", "Shell"),
    ("LICENSE", "Text"),
    ("COPYING", "Text"),
    ("MANIFEST.MF", "JAR Manifest"),
];

/// Extension (without the dot, lowercased) to candidate languages.
///
/// Entries with more than one candidate are ambiguous and get a content pass.
const EXTENSIONS: &[(&str, &[&str])] = &[
    ("go", &["Go"]),
    ("rs", &["Rust"]),
    ("c", &["C"]),
    ("h", &["C", "C++", "Objective-C"]),
    ("cc", &["C++"]),
    ("cpp", &["C++"]),
    ("cxx", &["C++"]),
    ("hpp", &["C++"]),
    ("hh", &["C++"]),
    ("m", &["Objective-C", "MATLAB"]),
    ("mm", &["Objective-C++"]),
    ("cs", &["C#"]),
    ("java", &["Java"]),
    ("kt", &["Kotlin"]),
    ("kts", &["Kotlin"]),
    ("scala", &["Scala"]),
    ("groovy", &["Groovy"]),
    ("gradle", &["Gradle"]),
    ("clj", &["Clojure"]),
    ("py", &["Python"]),
    ("pyi", &["Python"]),
    ("rb", &["Ruby"]),
    ("php", &["PHP"]),
    ("pl", &["Perl", "Prolog"]),
    ("pm", &["Perl"]),
    ("lua", &["Lua"]),
    ("r", &["R"]),
    ("jl", &["Julia"]),
    ("js", &["JavaScript"]),
    ("mjs", &["JavaScript"]),
    ("cjs", &["JavaScript"]),
    ("jsx", &["JavaScript"]),
    ("ts", &["TypeScript"]),
    ("tsx", &["TSX"]),
    ("vue", &["Vue"]),
    ("svelte", &["Svelte"]),
    ("dart", &["Dart"]),
    ("swift", &["Swift"]),
    ("ex", &["Elixir"]),
    ("exs", &["Elixir"]),
    ("erl", &["Erlang"]),
    ("hs", &["Haskell"]),
    ("ml", &["OCaml"]),
    ("fs", &["F#"]),
    ("zig", &["Zig"]),
    ("nim", &["Nim"]),
    ("sh", &["Shell"]),
    ("bash", &["Shell"]),
    ("zsh", &["Shell"]),
    ("fish", &["fish"]),
    ("ps1", &["PowerShell"]),
    ("bat", &["Batchfile"]),
    ("cmd", &["Batchfile"]),
    ("sql", &["SQL"]),
    ("html", &["HTML"]),
    ("htm", &["HTML"]),
    ("css", &["CSS"]),
    ("scss", &["SCSS"]),
    ("sass", &["Sass"]),
    ("less", &["Less"]),
    ("json", &["JSON"]),
    ("yaml", &["YAML"]),
    ("yml", &["YAML"]),
    ("toml", &["TOML"]),
    ("xml", &["XML"]),
    ("ini", &["INI"]),
    ("cfg", &["INI"]),
    ("properties", &["Java Properties"]),
    ("tf", &["HCL"]),
    ("hcl", &["HCL"]),
    ("tfvars", &["HCL"]),
    ("rego", &["Open Policy Agent"]),
    ("proto", &["Protocol Buffer"]),
    ("graphql", &["GraphQL"]),
    ("md", &["Markdown"]),
    ("markdown", &["Markdown"]),
    ("rst", &["reStructuredText"]),
    ("txt", &["Text"]),
    ("tex", &["TeX"]),
    ("csv", &["CSV"]),
    ("dockerfile", &["Dockerfile"]),
    ("mk", &["Makefile"]),
    ("cmake", &["CMake"]),
    ("nix", &["Nix"]),
    ("bzl", &["Starlark"]),
    ("cform", &["JSON"]),
    ("template", &["JSON"]),
];

/// Interpreter names in a `#!` line.
const INTERPRETERS: &[(&str, &str)] = &[
    ("python", "Python"),
    ("python3", "Python"),
    ("python2", "Python"),
    ("bash", "Shell"),
    ("sh", "Shell"),
    ("zsh", "Shell"),
    ("dash", "Shell"),
    ("ksh", "Shell"),
    ("node", "JavaScript"),
    ("deno", "TypeScript"),
    ("ruby", "Ruby"),
    ("perl", "Perl"),
    ("php", "PHP"),
    ("lua", "Lua"),
    ("Rscript", "R"),
    ("fish", "fish"),
    ("pwsh", "PowerShell"),
];

/// How many leading bytes content heuristics look at.
const CONTENT_WINDOW: usize = 4096;

/// Classify a file by name, then by content. `None` means unknown.
pub fn classify(name: &str, content: &[u8]) -> Option<&'static str> {
    if let Some(lang) = by_filename(name) {
        return Some(lang);
    }

    match by_extension(name) {
        [] => by_content(content, None),
        [only] => Some(*only),
        candidates => by_content(content, Some(candidates)).or(Some(candidates[0])),
    }
}

/// Language of a well-known file name (`Dockerfile.prod` counts as a Dockerfile).
pub fn by_filename(name: &str) -> Option<&'static str> {
    let base = base_name(name);
    if let Some((_, lang)) = FILENAMES.iter().find(|(f, _)| *f == base) {
        return Some(*lang);
    }
    if base.starts_with("Dockerfile.") || base.starts_with("Containerfile.") {
        return Some("Dockerfile");
    }
    None
}

/// Candidate languages for the file's extension; empty when unknown.
pub fn by_extension(name: &str) -> &'static [&'static str] {
    let ext = match Path::new(base_name(name)).extension() {
        Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
        None => return &[],
    };
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, langs)| *langs)
        .unwrap_or(&[])
}

/// Guess a language from content, optionally restricted to `candidates`.
pub fn by_content(content: &[u8], candidates: Option<&[&'static str]>) -> Option<&'static str> {
    let window = &content[..content.len().min(CONTENT_WINDOW)];
    let text = String::from_utf8_lossy(window);
    let allowed = |lang: &'static str| candidates.map_or(true, |c| c.contains(&lang));

    let guess = shebang(&text)
        .or_else(|| modeline(&text))
        .or_else(|| signature(&text, candidates));
    guess.filter(|lang| allowed(*lang))
}

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn shebang(text: &str) -> Option<&'static str> {
    let first = text.lines().next()?.strip_prefix("#!")?;
    let mut words = first.split_whitespace();
    let mut program = words.next()?.rsplit('/').next()?;
    if program == "env" {
        // `#!/usr/bin/env -S python3 -u`
        program = words.find(|w| !w.starts_with('-'))?;
    }
    let program = program.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    INTERPRETERS
        .iter()
        .find(|(p, _)| {
            *p == program || p.trim_end_matches(|c: char| c.is_ascii_digit()) == program
        })
        .map(|(_, lang)| *lang)
}

/// Emacs `-*- mode: x -*-` and vim `vim: set ft=x` modelines.
fn modeline(text: &str) -> Option<&'static str> {
    for line in text.lines().take(5) {
        let lower = line.to_ascii_lowercase();
        let mode = if let Some(idx) = lower.find("-*-") {
            let rest = &lower[idx + 3..];
            let rest = rest.split("-*-").next().unwrap_or(rest);
            rest.split(';')
                .map(str::trim)
                .find_map(|kv| kv.strip_prefix("mode:"))
                .map(str::trim)
                .or_else(|| Some(rest.trim()).filter(|r| !r.contains(':')))
        } else if let Some(idx) = lower.find("vim:") {
            lower[idx + 4..]
                .split(|c: char| c.is_whitespace() || c == ':')
                .find_map(|kv| kv.strip_prefix("ft=").or_else(|| kv.strip_prefix("filetype=")))
        } else {
            None
        };
        if let Some(mode) = mode {
            if let Some(lang) = mode_language(mode) {
                return Some(lang);
            }
        }
    }
    None
}

fn mode_language(mode: &str) -> Option<&'static str> {
    Some(match mode {
        "python" => "Python",
        "ruby" => "Ruby",
        "perl" | "cperl" => "Perl",
        "sh" | "shell-script" | "bash" | "zsh" => "Shell",
        "c" => "C",
        "c++" | "cpp" => "C++",
        "objc" | "objective-c" => "Objective-C",
        "js" | "javascript" => "JavaScript",
        "go" => "Go",
        "rust" => "Rust",
        "lua" => "Lua",
        "yaml" => "YAML",
        "dockerfile" => "Dockerfile",
        "make" | "makefile" => "Makefile",
        _ => return None,
    })
}

/// Strong leading-content signatures.
fn signature(text: &str, candidates: Option<&[&'static str]>) -> Option<&'static str> {
    let trimmed = text.trim_start();
    let lower = trimmed.to_ascii_lowercase();

    if trimmed.starts_with("<?php") {
        return Some("PHP");
    }
    if trimmed.starts_with("<?xml") {
        return Some("XML");
    }
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        return Some("HTML");
    }

    let has_line = |prefix: &str| text.lines().any(|l| l.trim_start().starts_with(prefix));

    // Ambiguous C-family headers.
    if let Some(c) = candidates {
        if c.contains(&"Objective-C") && (has_line("@interface") || has_line("#import")) {
            return Some("Objective-C");
        }
        if c.contains(&"C++")
            && (has_line("namespace ") || has_line("template<") || has_line("template <") || has_line("class "))
        {
            return Some("C++");
        }
        if c.contains(&"C") && has_line("#include") {
            return Some("C");
        }
        if c.contains(&"MATLAB") && has_line("function ") {
            return Some("MATLAB");
        }
        if c.contains(&"Prolog") && has_line(":- ") {
            return Some("Prolog");
        }
        if c.contains(&"Perl") && (has_line("use strict") || has_line("my $")) {
            return Some("Perl");
        }
        return None;
    }

    if has_line("package ") && has_line("func ") {
        return Some("Go");
    }
    if has_line("fn main()") || has_line("pub fn ") {
        return Some("Rust");
    }
    if has_line("FROM ") && (has_line("RUN ") || has_line("CMD ") || has_line("ENTRYPOINT ")) {
        return Some("Dockerfile");
    }
    if has_line("resource \"") || has_line("provider \"") || has_line("terraform {") {
        return Some("HCL");
    }
    if has_line("package ") && (has_line("deny[") || has_line("deny contains") || has_line("allow ")) {
        return Some("Open Policy Agent");
    }
    if has_line("#include") {
        return Some("C");
    }
    if has_line("<?php") {
        return Some("PHP");
    }
    None
}
