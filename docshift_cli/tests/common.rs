#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;

pub fn docshift_cmd() -> Command {
	let mut cmd = Command::cargo_bin("docshift").unwrap_or_else(|e| panic!("binary: {e}"));
	cmd.env("NO_COLOR", "1").env_remove("DOCSHIFT_LOG");
	cmd
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
	let path = root.join(relative);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create {parent:?}: {e}"));
	}
	std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {path:?}: {e}"));
}

/// A two version source tree with a link that needs rewriting.
pub fn sample_source(root: &Path) {
	write_file(
		root,
		"1.0/intro.md",
		"---\ntitle: Introduction\nsidebar_position: 1\n---\n\nSee [setup](./setup.md).\n",
	);
	write_file(
		root,
		"1.0/setup.md",
		"---\nsidebar_position: 2\n---\n\n# Setup\n\nInstall it.\n",
	);
	write_file(
		root,
		"2.0/intro.md",
		"---\ntitle: Introduction\n---\n\n:::note\nNew in 2.0.\n:::\n",
	);
}
