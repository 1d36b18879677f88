//! Файлы записей: замена, откат при ошибке чтения и поиск

use super::common::*;
use datapool::{File, PreloadOption};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Поток, который обрывается после `left` байтов
struct BrokenStream {
    left: usize,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset"));
        }
        let n = buf.len().min(self.left);
        buf[..n].fill(b'C');
        self.left -= n;
        Ok(n)
    }
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(&dir).into_iter().flatten().flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}

#[test]
fn test_file_replace_with_rollback() {
    let ctx = IntegrationTestContext::new();
    let id = ctx.create("data1", "files", 0);
    let mut entry = ctx.get_entry(id, PreloadOption::Meta).unwrap().unwrap();

    entry
        .set_file("icon", File::from_bytes("icon", "icon.gif", vec![b'A'; 10]))
        .unwrap();
    entry.commit("tester").unwrap();
    let first = entry.get_file("icon", None).unwrap().unwrap();
    assert_eq!(first.clone_content(), vec![b'A'; 10]);

    entry
        .set_file("icon", File::from_bytes("icon", "icon.gif", vec![b'B'; 20]))
        .unwrap();
    entry.commit("tester").unwrap();
    let second = entry.get_file("icon", None).unwrap().unwrap();
    assert_eq!(second.path, first.path);
    assert_eq!(second.clone_content(), vec![b'B'; 20]);
    let names: Vec<String> = walk(&ctx.files_root())
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().all(|n| !n.contains("_del_")), "backups left: {:?}", names);

    let broken = File::from_reader("icon", "icon.gif", Box::new(BrokenStream { left: 7 }));
    entry.set_file("icon", broken).unwrap();
    assert!(entry.commit("tester").is_err());

    let third = entry.get_file("icon", None).unwrap().unwrap();
    assert_eq!(third.clone_content(), vec![b'B'; 20]);
    let files = walk(&ctx.files_root());
    assert_eq!(files.len(), 1, "unexpected files: {:?}", files);
}

#[test]
fn test_one_row_per_filekey() {
    let ctx = IntegrationTestContext::new();
    let id = ctx.create("data2", "slots", 0);
    let mut entry = ctx.get_entry(id, PreloadOption::Meta).unwrap().unwrap();
    for round in 0..3u8 {
        entry
            .set_file("doc", File::from_bytes("doc", "doc.txt", vec![round; 4]))
            .unwrap();
        entry
            .set_file("img", File::from_bytes("img", format!("img{}.png", round), vec![round; 8]))
            .unwrap();
        entry.commit("tester").unwrap();
    }
    assert_eq!(ctx.count_rows("pool_files", "id", id), 2);
    let mut keys = entry.file_keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["doc".to_string(), "img".to_string()]);
    assert_eq!(ctx.search_filename("img2.png").unwrap().len(), 1);
}

trait CloneContent {
    fn clone_content(&self) -> Vec<u8>;
}

impl CloneContent for File {
    fn clone_content(&self) -> Vec<u8> {
        std::fs::read(self.abs_path().expect("stored file")).expect("read stored file")
    }
}
