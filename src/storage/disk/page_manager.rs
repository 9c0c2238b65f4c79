use crate::error::{DbError, DbResult};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Positioned reads and writes of fixed-size pages. Page `n` lives at byte
/// offset `n * page_size`; the file only ever grows by whole pages.
#[derive(Debug)]
pub struct PageManager {
    file: File,
    page_size: usize,
}

impl PageManager {
    /// Open `path`, creating an empty file if it does not exist.
    pub fn open(path: &Path, page_size: usize) -> DbResult<Self> {
        if page_size == 0 {
            return Err(DbError::InvalidArgument("page size must be non-zero".to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self { file, page_size })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn read_page(&mut self, page_no: usize, buf: &mut [u8]) -> DbResult<()> {
        if buf.len() != self.page_size {
            return Err(DbError::InvalidArgument(format!(
                "Buffer size must be {}, got {}",
                self.page_size,
                buf.len()
            )));
        }

        let offset = self.page_offset(page_no);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;

        Ok(())
    }

    pub fn write_page(&mut self, page_no: usize, data: &[u8]) -> DbResult<()> {
        if data.len() != self.page_size {
            return Err(DbError::InvalidArgument(format!(
                "Data size must be {}, got {}",
                self.page_size,
                data.len()
            )));
        }

        let num_pages = self.num_pages()?;
        if page_no > num_pages {
            return Err(DbError::InvalidArgument(format!(
                "Cannot write page {}: file has {} pages and must grow without gaps",
                page_no, num_pages
            )));
        }

        let offset = self.page_offset(page_no);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;

        Ok(())
    }

    pub fn num_pages(&self) -> DbResult<usize> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / self.page_size as u64) as usize)
    }

    fn page_offset(&self, page_no: usize) -> u64 {
        page_no as u64 * self.page_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 512;

    #[test]
    fn test_open_creates_empty_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.dat");

        {
            let pm = PageManager::open(&file_path, PAGE_SIZE)?;
            assert_eq!(pm.num_pages()?, 0);
        }
        assert!(file_path.exists());

        let pm = PageManager::open(&file_path, PAGE_SIZE)?;
        assert_eq!(pm.num_pages()?, 0);
        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let mut pm = PageManager::open(&dir.path().join("test.dat"), PAGE_SIZE)?;

        let mut write_buf = vec![0u8; PAGE_SIZE];
        write_buf[0] = 42;
        write_buf[PAGE_SIZE - 1] = 24;
        pm.write_page(0, &write_buf)?;

        let mut read_buf = vec![0u8; PAGE_SIZE];
        pm.read_page(0, &mut read_buf)?;
        assert_eq!(read_buf, write_buf);
        Ok(())
    }

    #[test]
    fn test_append_grows_by_one_page() -> Result<()> {
        let dir = tempdir()?;
        let mut pm = PageManager::open(&dir.path().join("test.dat"), PAGE_SIZE)?;

        for i in 0..5 {
            let buf = vec![i as u8; PAGE_SIZE];
            pm.write_page(i, &buf)?;
            assert_eq!(pm.num_pages()?, i + 1);
        }

        // Read pages back, no overlap between neighbours
        for i in 0..5 {
            let mut buf = vec![0u8; PAGE_SIZE];
            pm.read_page(i, &mut buf)?;
            assert!(buf.iter().all(|&b| b == i as u8));
        }
        Ok(())
    }

    #[test]
    fn test_gap_rejected() -> Result<()> {
        let dir = tempdir()?;
        let mut pm = PageManager::open(&dir.path().join("test.dat"), PAGE_SIZE)?;

        let buf = vec![5u8; PAGE_SIZE];
        assert!(matches!(
            pm.write_page(3, &buf),
            Err(DbError::InvalidArgument(_))
        ));
        assert_eq!(pm.num_pages()?, 0);
        Ok(())
    }

    #[test]
    fn test_read_past_end_is_io_error() -> Result<()> {
        let dir = tempdir()?;
        let mut pm = PageManager::open(&dir.path().join("test.dat"), PAGE_SIZE)?;

        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(matches!(pm.read_page(10, &mut buf), Err(DbError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_invalid_buffer_size() -> Result<()> {
        let dir = tempdir()?;
        let mut pm = PageManager::open(&dir.path().join("test.dat"), PAGE_SIZE)?;

        let mut small_buf = vec![0u8; 100];
        assert!(pm.read_page(0, &mut small_buf).is_err());
        assert!(pm.write_page(0, &small_buf).is_err());
        Ok(())
    }

    #[test]
    fn test_partial_trailing_page_not_counted() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.dat");
        std::fs::write(&path, vec![1u8; PAGE_SIZE * 2 + 10])?;

        let pm = PageManager::open(&path, PAGE_SIZE)?;
        assert_eq!(pm.num_pages()?, 2);
        Ok(())
    }

    #[test]
    fn test_persistence() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.dat");

        {
            let mut pm = PageManager::open(&file_path, PAGE_SIZE)?;
            pm.write_page(0, &vec![99u8; PAGE_SIZE])?;
        }

        let mut pm = PageManager::open(&file_path, PAGE_SIZE)?;
        let mut buf = vec![0u8; PAGE_SIZE];
        pm.read_page(0, &mut buf)?;
        assert_eq!(buf[0], 99);
        Ok(())
    }
}
