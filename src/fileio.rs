//! File content read/write/free through the FileIndex chain (spec.md §4.4).
//!
//! A file's inode `bno` points at the head FileIndex block. Each FileIndex
//! holds up to `K` data block pointers (zero-terminated) plus a `next`
//! pointer chaining to another FileIndex block (`0` terminates the chain).
//! Data blocks are written left-padded with content and zero-padded at the
//! tail; the read path skips zero bytes so a file's content round-trips
//! byte-exact (spec.md §4.4), matching `original_source`'s `readFileBlock`
//! (`CommandLineInterface.cpp`), which only appends a byte if it's nonzero.

use crate::error::FsResult;
use crate::file_index::FileIndex;
use crate::volume::Volume;

/// Reads a file's full content by walking its FileIndex chain.
pub fn read_file(vol: &mut Volume, head: u32) -> FsResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut fi_bno = head;
    loop {
        let fi = vol.read_file_index(fi_bno)?;
        for &data_bno in fi.index.iter().take(fi.live_count()) {
            let block = vol.read_block(data_bno)?;
            out.extend(block.into_iter().filter(|&b| b != 0));
        }
        if fi.next == 0 {
            break;
        }
        fi_bno = fi.next;
    }
    Ok(out)
}

/// Overwrites a file's content, replacing its FileIndex chain entirely.
/// Builds the new chain fully before freeing the old one, so a failure
/// partway through allocation leaves the old content intact (spec.md §5
/// resource discipline). Returns the new head FileIndex block; callers must
/// update the owning inode's `bno` to this value and write it back.
pub fn write_file(vol: &mut Volume, old_head: u32, data: &[u8]) -> FsResult<u32> {
    let new_head = build_chain(vol, data)?;
    free_chain(vol, old_head)?;
    Ok(new_head)
}

/// Builds a fresh FileIndex chain holding `data`, allocating as many data
/// blocks and FileIndex blocks as needed. On allocation failure midway,
/// frees everything allocated so far before propagating the error.
fn build_chain(vol: &mut Volume, data: &[u8]) -> FsResult<u32> {
    let block_size = vol.block_size() as usize;
    let capacity = vol.file_index_capacity() as usize;
    let chunks: Vec<&[u8]> = data.chunks(block_size).collect();

    let mut allocated_data_blocks = Vec::new();
    let mut allocated_fi_blocks = Vec::new();

    let result = (|| -> FsResult<u32> {
        let mut fi_blocks: Vec<FileIndex> = Vec::new();
        let mut chunk_iter = chunks.iter();
        loop {
            let mut fi = FileIndex::empty(capacity as u32);
            let mut filled = 0;
            for slot in fi.index.iter_mut() {
                let Some(chunk) = chunk_iter.next() else { break };
                let bno = vol.allocate()?;
                allocated_data_blocks.push(bno);
                vol.write_block(bno, chunk)?;
                *slot = bno;
                filled += 1;
            }
            fi_blocks.push(fi);
            if filled < capacity || chunk_iter.len() == 0 {
                break;
            }
        }
        if fi_blocks.is_empty() {
            fi_blocks.push(FileIndex::empty(capacity as u32));
        }

        // Allocate one FileIndex block per entry except the first, which
        // reuses the inode's existing `bno` via the caller.
        let head_bno = vol.allocate()?;
        allocated_fi_blocks.push(head_bno);
        let mut prev_bno = head_bno;
        for (i, fi) in fi_blocks.iter_mut().enumerate() {
            if i + 1 < fi_blocks.len() {
                let next_bno = vol.allocate()?;
                allocated_fi_blocks.push(next_bno);
                fi.next = next_bno;
            }
            let bno = if i == 0 { head_bno } else { allocated_fi_blocks[i] };
            vol.write_file_index(bno, fi)?;
            prev_bno = bno;
        }
        let _ = prev_bno;
        Ok(head_bno)
    })();

    match result {
        Ok(head) => Ok(head),
        Err(e) => {
            for bno in allocated_data_blocks {
                let _ = vol.free(bno);
            }
            for bno in allocated_fi_blocks {
                let _ = vol.free(bno);
            }
            Err(e)
        }
    }
}

/// Frees every block in a file's chain: data blocks first, then the
/// FileIndex blocks themselves.
pub fn free_chain(vol: &mut Volume, head: u32) -> FsResult<()> {
    let mut fi_bnos = Vec::new();
    let mut fi_bno = head;
    loop {
        let fi = vol.read_file_index(fi_bno)?;
        for &data_bno in fi.index.iter().take(fi.live_count()) {
            vol.free(data_bno)?;
        }
        fi_bnos.push(fi_bno);
        if fi.next == 0 {
            break;
        }
        fi_bno = fi.next;
    }
    for bno in fi_bnos {
        vol.free(bno)?;
    }
    Ok(())
}

/// Allocates a fresh, empty FileIndex block for a newly created file.
pub fn new_empty_file(vol: &mut Volume) -> FsResult<u32> {
    let capacity = vol.file_index_capacity();
    let bno = vol.allocate()?;
    vol.write_file_index(bno, &FileIndex::empty(capacity))?;
    Ok(bno)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::NamedTempFile;

    fn volume() -> Volume {
        let tmp = NamedTempFile::new().unwrap();
        Volume::create_and_format(tmp.path(), 512 * 1024, 512).unwrap()
    }

    #[test]
    fn write_then_read_small_file() {
        let mut vol = volume();
        let head = new_empty_file(&mut vol).unwrap();
        let head = write_file(&mut vol, head, b"hello world").unwrap();
        let back = read_file(&mut vol, head).unwrap();
        assert_eq!(back, b"hello world");
    }

    #[test]
    fn write_spanning_multiple_file_index_blocks() {
        let mut vol = volume();
        let head = new_empty_file(&mut vol).unwrap();
        let capacity = vol.file_index_capacity() as usize;
        let block_size = vol.block_size() as usize;
        let data = vec![7u8; block_size * (capacity + 3)];
        let head = write_file(&mut vol, head, &data).unwrap();
        let back = read_file(&mut vol, head).unwrap();
        assert_eq!(back.len(), block_size * (capacity + 3));
        assert!(back.iter().all(|&b| b == 7));
    }

    #[test]
    fn overwrite_shrinks_file_and_frees_old_blocks() {
        let mut vol = volume();
        let head = new_empty_file(&mut vol).unwrap();
        let block_size = vol.block_size() as usize;
        let head = write_file(&mut vol, head, &vec![1u8; block_size * 5]).unwrap();
        let free_mid = vol.superblock().free_block_number;
        let head = write_file(&mut vol, head, b"short").unwrap();
        assert!(vol.superblock().free_block_number > free_mid);
        let back = read_file(&mut vol, head).unwrap();
        assert_eq!(back, b"short");
    }

    #[test]
    fn free_chain_reclaims_all_blocks() {
        let mut vol = volume();
        let free_before = vol.superblock().free_block_number;
        let head = new_empty_file(&mut vol).unwrap();
        let block_size = vol.block_size() as usize;
        write_file(&mut vol, head, &vec![9u8; block_size * 4]).unwrap();
        free_chain(&mut vol, head).unwrap();
        assert_eq!(vol.superblock().free_block_number, free_before);
    }
}
