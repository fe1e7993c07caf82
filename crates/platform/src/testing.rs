//! In-process test double for the external tool surface
//!
//! [`FakeHost`] interprets the filesystem commands the patcher issues
//! (`cp`, `rm`, `mv`, `rsync`, `ditto`, `unzip`, `mkdir`) natively against a
//! sandbox directory, re-rooting absolute paths under it. Query and
//! system-management tools (`diskutil`, `nvram`, `bless`, `kmutil`, ...)
//! succeed with empty output unless a stub overrides them. Archives are
//! modeled as plain directories; the zip container format is irrelevant to
//! what the tests assert.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use rootpatch_errors::Error;

use crate::process::{ToolCommand, ToolOutput, ToolRunner};

pub struct FakeHost {
    root: PathBuf,
    invocations: Mutex<Vec<String>>,
    nth_failures: Mutex<HashMap<usize, String>>,
    match_failures: Mutex<Vec<(String, String)>>,
    stubs: Mutex<Vec<(String, ToolOutput)>>,
}

impl FakeHost {
    /// Sandbox all filesystem effects under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            invocations: Mutex::new(Vec::new()),
            nth_failures: Mutex::new(HashMap::new()),
            match_failures: Mutex::new(Vec::new()),
            stubs: Mutex::new(Vec::new()),
        }
    }

    /// Every command issued so far, in shell rendering, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Make the `index`-th command (0-based, over all commands) exit 1 with
    /// `message` on stderr.
    pub fn fail_nth(&self, index: usize, message: impl Into<String>) {
        if let Ok(mut failures) = self.nth_failures.lock() {
            failures.insert(index, message.into());
        }
    }

    /// Make every command whose rendering starts with `prefix` exit 1.
    pub fn fail_matching(&self, prefix: impl Into<String>, message: impl Into<String>) {
        if let Ok(mut failures) = self.match_failures.lock() {
            failures.push((prefix.into(), message.into()));
        }
    }

    /// Canned output for commands whose rendering starts with `prefix`.
    /// Stubs take precedence over native interpretation.
    pub fn stub(&self, prefix: impl Into<String>, output: ToolOutput) {
        if let Ok(mut stubs) = self.stubs.lock() {
            stubs.push((prefix.into(), output));
        }
    }

    /// Re-root an absolute path into the sandbox.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match path.strip_prefix("/") {
            Ok(relative) => self.root.join(relative),
            Err(_) => self.root.join(path),
        }
    }

    fn interpret(&self, command: &ToolCommand) -> ToolOutput {
        let result = match command.program() {
            "cp" => self.run_cp(command.get_args()),
            "rm" => self.run_rm(command.get_args()),
            "mv" => self.run_mv(command.get_args()),
            "mkdir" => self.run_mkdir(command.get_args()),
            "rsync" => self.run_rsync(command.get_args()),
            "ditto" => self.run_ditto(command.get_args()),
            "unzip" => self.run_unzip(command.get_args()),
            "mount" => self.run_mount(command.get_args()),
            // Ownership, permissions and system management tools have no
            // observable filesystem effect the tests care about.
            _ => Ok(()),
        };
        match result {
            Ok(()) => ToolOutput::ok(""),
            Err(message) => ToolOutput::failed(1, message),
        }
    }

    fn run_cp(&self, args: &[String]) -> Result<(), String> {
        let paths = non_flag_args(args);
        let [src, dst] = paths.as_slice() else {
            return Err("cp: expected source and destination".to_string());
        };
        let src = self.resolve(src);
        let mut dst = self.resolve(dst);
        if dst.is_dir() {
            let Some(name) = src.file_name() else {
                return Err("cp: source has no file name".to_string());
            };
            dst = dst.join(name);
        }
        copy_tree(&src, &dst).map_err(|e| format!("cp: {e}"))
    }

    fn run_rm(&self, args: &[String]) -> Result<(), String> {
        for target in non_flag_args(args) {
            let target = self.resolve(target);
            if target.is_dir() {
                std::fs::remove_dir_all(&target).map_err(|e| format!("rm: {e}"))?;
            } else if target.exists() {
                std::fs::remove_file(&target).map_err(|e| format!("rm: {e}"))?;
            }
            // rm -f on a missing path succeeds
        }
        Ok(())
    }

    fn run_mv(&self, args: &[String]) -> Result<(), String> {
        let paths = non_flag_args(args);
        let [src, dst] = paths.as_slice() else {
            return Err("mv: expected source and destination".to_string());
        };
        std::fs::rename(self.resolve(src), self.resolve(dst)).map_err(|e| format!("mv: {e}"))
    }

    fn run_mkdir(&self, args: &[String]) -> Result<(), String> {
        for target in non_flag_args(args) {
            std::fs::create_dir_all(self.resolve(target)).map_err(|e| format!("mkdir: {e}"))?;
        }
        Ok(())
    }

    /// `rsync -r -i -a source/ dest`: trailing slash merges the source's
    /// contents into dest, otherwise the source directory itself lands
    /// inside dest.
    fn run_rsync(&self, args: &[String]) -> Result<(), String> {
        let paths = non_flag_args(args);
        let [src, dst] = paths.as_slice() else {
            return Err("rsync: expected source and destination".to_string());
        };
        let merge_contents = src.ends_with('/');
        let src_path = self.resolve(src.trim_end_matches('/'));
        let dst_path = self.resolve(dst);
        if merge_contents {
            merge_tree(&src_path, &dst_path).map_err(|e| format!("rsync: {e}"))
        } else {
            let Some(name) = src_path.file_name() else {
                return Err("rsync: source has no file name".to_string());
            };
            merge_tree(&src_path, &dst_path.join(name)).map_err(|e| format!("rsync: {e}"))
        }
    }

    /// `ditto -c -k --keepParent src archive`: the archive becomes a
    /// directory containing `src`'s top-level directory.
    fn run_ditto(&self, args: &[String]) -> Result<(), String> {
        let paths = non_flag_args(args);
        let [src, archive] = paths.as_slice() else {
            return Err("ditto: expected source and archive".to_string());
        };
        let src = self.resolve(src);
        let archive = self.resolve(archive);
        let Some(name) = src.file_name() else {
            return Err("ditto: source has no file name".to_string());
        };
        if archive.exists() {
            std::fs::remove_dir_all(&archive).map_err(|e| format!("ditto: {e}"))?;
        }
        copy_tree(&src, &archive.join(name)).map_err(|e| format!("ditto: {e}"))
    }

    /// `mount -o nobrowse -t apfs /dev/diskX target`: simulate the volume
    /// appearing by materializing the standard system tree at the target.
    /// `mount -uw /` is a no-op.
    fn run_mount(&self, args: &[String]) -> Result<(), String> {
        if args.first().is_some_and(|a| a == "-uw") {
            return Ok(());
        }
        let Some(target) = args.last() else {
            return Err("mount: missing target".to_string());
        };
        let target = self.resolve(target);
        for dir in [
            "System/Library/Extensions",
            "System/Library/Frameworks",
            "System/Library/PrivateFrameworks",
            "System/Library/CoreServices",
            "System/Library/LaunchDaemons",
            "usr/libexec",
        ] {
            std::fs::create_dir_all(target.join(dir)).map_err(|e| format!("mount: {e}"))?;
        }
        Ok(())
    }

    /// `unzip -q archive -d dest`: unpack the archive's contents into dest.
    fn run_unzip(&self, args: &[String]) -> Result<(), String> {
        let mut archive = None;
        let mut dest = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "-d" {
                dest = iter.next();
            } else if !arg.starts_with('-') {
                archive = Some(arg);
            }
        }
        let (Some(archive), Some(dest)) = (archive, dest) else {
            return Err("unzip: expected archive and -d destination".to_string());
        };
        let archive = self.resolve(archive);
        if !archive.exists() {
            return Err(format!("unzip: cannot find {}", archive.display()));
        }
        merge_tree(&archive, &self.resolve(dest)).map_err(|e| format!("unzip: {e}"))
    }
}

#[async_trait]
impl ToolRunner for FakeHost {
    async fn run(&self, command: ToolCommand) -> Result<ToolOutput, Error> {
        let rendered = command.display();
        let index = {
            let Ok(mut invocations) = self.invocations.lock() else {
                return Err(Error::internal("fake host lock poisoned"));
            };
            invocations.push(rendered.clone());
            invocations.len() - 1
        };

        if let Ok(failures) = self.nth_failures.lock() {
            if let Some(message) = failures.get(&index) {
                return Ok(ToolOutput::failed(1, message.clone()));
            }
        }
        if let Ok(failures) = self.match_failures.lock() {
            if let Some((_, message)) = failures.iter().find(|(p, _)| rendered.starts_with(p)) {
                return Ok(ToolOutput::failed(1, message.clone()));
            }
        }
        if let Ok(stubs) = self.stubs.lock() {
            if let Some((_, output)) = stubs.iter().find(|(p, _)| rendered.starts_with(p)) {
                return Ok(output.clone());
            }
        }

        Ok(self.interpret(&command))
    }

    fn path_exists(&self, path: &std::path::Path) -> bool {
        self.resolve(path).exists()
    }
}

fn non_flag_args(args: &[String]) -> Vec<&String> {
    args.iter().filter(|a| !a.starts_with('-')).collect()
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    if src.is_dir() {
        std::fs::create_dir_all(dst)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst)?;
    }
    Ok(())
}

/// Like [`copy_tree`] but never deletes what is already in `dst`; same-named
/// files are overwritten, unrelated ones survive.
fn merge_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    copy_tree(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::run_checked;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn cp_into_directory_keeps_source_name() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(&host.resolve("/payloads/Foo.kext/Contents/Info.plist"), "x");
        std::fs::create_dir_all(host.resolve("/System/Library/Extensions")).unwrap();

        run_checked(
            &host,
            ToolCommand::new("cp")
                .arg("-R")
                .arg("/payloads/Foo.kext")
                .arg("/System/Library/Extensions"),
        )
        .await
        .unwrap();

        assert!(host
            .resolve("/System/Library/Extensions/Foo.kext/Contents/Info.plist")
            .exists());
    }

    #[tokio::test]
    async fn rsync_trailing_slash_merges_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(&host.resolve("/overlay/Frameworks/New.framework/New"), "n");
        write(&host.resolve("/mnt/Frameworks/Old.framework/Old"), "o");

        run_checked(
            &host,
            ToolCommand::new("rsync")
                .args(["-r", "-i", "-a"])
                .arg("/overlay/Frameworks/")
                .arg("/mnt/Frameworks"),
        )
        .await
        .unwrap();

        assert!(host.resolve("/mnt/Frameworks/New.framework/New").exists());
        assert!(host.resolve("/mnt/Frameworks/Old.framework/Old").exists());
    }

    #[tokio::test]
    async fn ditto_then_unzip_round_trips_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        write(&host.resolve("/mnt/Extensions/A.kext/a"), "a");

        run_checked(
            &host,
            ToolCommand::new("ditto")
                .args(["-c", "-k", "--keepParent"])
                .arg("/mnt/Extensions")
                .arg("/mnt/Extensions-Backup.zip"),
        )
        .await
        .unwrap();

        std::fs::remove_dir_all(host.resolve("/mnt/Extensions")).unwrap();

        run_checked(
            &host,
            ToolCommand::new("unzip")
                .arg("-q")
                .arg("/mnt/Extensions-Backup.zip")
                .args(["-d", "/mnt"]),
        )
        .await
        .unwrap();

        assert!(host.resolve("/mnt/Extensions/A.kext/a").exists());
    }

    #[tokio::test]
    async fn nth_failure_and_recording() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.fail_nth(1, "device busy");

        let first = host.run(ToolCommand::new("chmod").args(["-Rf", "755", "/x"])).await.unwrap();
        assert!(first.success());
        let second = host.run(ToolCommand::new("chown").args(["-Rf", "root:wheel", "/x"])).await.unwrap();
        assert_eq!(second.code, 1);
        assert_eq!(second.stderr, "device busy");

        assert_eq!(host.invocations().len(), 2);
        assert!(host.invocations()[0].starts_with("chmod"));
    }

    #[tokio::test]
    async fn stub_overrides_native_interpretation() {
        let tmp = tempfile::tempdir().unwrap();
        let host = FakeHost::new(tmp.path());
        host.stub("diskutil info", ToolOutput::ok("   Device Identifier:        disk1s5s1\n"));

        let out = host
            .run(ToolCommand::new("diskutil").args(["info", "/"]))
            .await
            .unwrap();
        assert!(out.stdout.contains("disk1s5s1"));
    }
}
