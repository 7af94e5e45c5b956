use std::fs;
use std::path::Path;

use clap::CommandFactory;

// The argument tree (range overrides, config setters, completions) lives in
// cli.rs, which depends on nothing outside build-dependencies.
#[path = "src/cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR").expect("OUT_DIR not set by Cargo");
    let man_dir = Path::new(&out_dir).join("man");
    fs::create_dir_all(&man_dir).expect("failed to create man output directory");

    let mut pages = Vec::new();
    collect_pages(cli::Cli::command(), &mut pages);
    for (file, page) in pages {
        let path = man_dir.join(file);
        fs::write(&path, page).unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
    }
}

/// One page per command: `uwbctl.1`, `uwbctl-range.1`, `uwbctl-config-set-role.1`, ...
/// The hidden simulation flags stay out of every page.
fn collect_pages(cmd: clap::Command, pages: &mut Vec<(String, Vec<u8>)>) {
    let name = cmd.get_name().to_owned();
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut page)
        .unwrap_or_else(|e| panic!("failed to render man page for `{name}`: {e}"));
    pages.push((format!("{name}.1"), page));

    for sub in cmd.get_subcommands().filter(|sub| !sub.is_hide_set()) {
        collect_pages(sub.clone().name(format!("{name}-{}", sub.get_name())), pages);
    }
}
