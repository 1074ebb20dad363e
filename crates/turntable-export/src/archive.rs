use std::io::{self, Write};

use tar::{Builder, EntryType, Header};
use turntable_render::{encode_png, FrameImage};

use crate::naming::frame_file_name;
use crate::{ExportError, SequenceName, ViewerConfig};

/// A complete, contiguous frame sequence. Only [`crate::package_sequence`]
/// builds one, so holding a value means every frame is present.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceArchive {
    name: SequenceName,
    frames: Vec<FrameImage>,
}

impl SequenceArchive {
    pub(crate) fn new(name: SequenceName, frames: Vec<FrameImage>) -> Self {
        Self { name, frames }
    }

    pub fn name(&self) -> &SequenceName {
        &self.name
    }

    pub fn frames(&self) -> &[FrameImage] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// `{name}.tar`
    pub fn archive_file_name(&self) -> String {
        format!("{}.tar", self.name)
    }

    /// Path of one frame inside the archive, `{name}/{name}-{index}.png`.
    pub fn frame_path(&self, index: u32) -> String {
        format!(
            "{}/{}",
            self.name,
            frame_file_name(&self.name, index, self.frames.len())
        )
    }

    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig::for_sequence(&self.name, self.frames.len())
    }

    /// Streams the archive as tar: the sequence directory, every frame as PNG
    /// in index order, then `viewer.json`.
    ///
    /// Headers carry no timestamps or ownership, so equal sequences always
    /// produce equal bytes.
    pub fn write_tar<W: Write>(&self, writer: W) -> Result<W, ExportError> {
        let mut builder = Builder::new(writer);

        let mut dir = Header::new_gnu();
        dir.set_entry_type(EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_mtime(0);
        dir.set_cksum();
        builder.append_data(&mut dir, format!("{}/", self.name), io::empty())?;

        for frame in &self.frames {
            let png = encode_png(frame)?;
            append_file(&mut builder, &self.frame_path(frame.index), &png)?;
        }

        let viewer = serde_json::to_vec_pretty(&self.viewer_config())?;
        append_file(&mut builder, &format!("{}/viewer.json", self.name), &viewer)?;

        let writer = builder.into_inner()?;
        tracing::info!(
            sequence = %self.name,
            frames = self.frames.len(),
            "archive written"
        );
        Ok(writer)
    }
}

fn append_file<W: Write>(builder: &mut Builder<W>, path: &str, bytes: &[u8]) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder.append_data(&mut header, path, bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::package_sequence;
    use crate::test_support::frames;

    fn archive(count: u32) -> SequenceArchive {
        let name = SequenceName::parse("doji_diamond_ring-rose-gold-sequence").unwrap();
        package_sequence(frames(0..count), name, count).unwrap()
    }

    #[test]
    fn paths_encode_name_and_index() {
        let archive = archive(36);
        assert_eq!(
            archive.archive_file_name(),
            "doji_diamond_ring-rose-gold-sequence.tar"
        );
        assert_eq!(
            archive.frame_path(9),
            "doji_diamond_ring-rose-gold-sequence/doji_diamond_ring-rose-gold-sequence-009.png"
        );
    }

    #[test]
    fn tar_holds_every_frame_and_the_viewer_record() {
        let archive = archive(36);
        let bytes = archive.write_tar(Vec::new()).unwrap();

        let mut reader = tar::Archive::new(bytes.as_slice());
        let mut pngs = Vec::new();
        let mut viewer = None;
        for entry in reader.entries().unwrap() {
            let mut entry = entry.unwrap();
            assert_eq!(entry.header().mtime().unwrap(), 0);
            let path = entry.path().unwrap().to_string_lossy().to_string();
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            if path.ends_with(".png") {
                assert_eq!(&body[..4], b"\x89PNG");
                pngs.push(path);
            } else if path.ends_with("viewer.json") {
                viewer = Some(body);
            }
        }

        assert_eq!(pngs.len(), 36);
        assert_eq!(pngs[0], archive.frame_path(0));
        assert_eq!(pngs[35], archive.frame_path(35));
        let viewer: ViewerConfig = serde_json::from_slice(&viewer.unwrap()).unwrap();
        assert_eq!(viewer, archive.viewer_config());
        assert_eq!(viewer.image_count, 36);
    }

    #[test]
    fn equal_sequences_write_equal_bytes() {
        let a = archive(5).write_tar(Vec::new()).unwrap();
        let b = archive(5).write_tar(Vec::new()).unwrap();
        assert_eq!(a, b);
    }
}
