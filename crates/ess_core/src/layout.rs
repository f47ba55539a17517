use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The regions of an uncompressed container, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionId {
    Header,
    FormVersion,
    VersionString,
    PluginTable,
    OffsetTable,
    Table1,
    Table2,
    ChangeForms,
    Table3,
    FormIdArray,
    WorldspaceArray,
    UnknownTail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    pub id: RegionId,
    pub range: ByteRange,
}

#[derive(Debug, Clone)]
pub struct FileLayout {
    pub file_len: usize,
    pub regions: Vec<RegionLayout>,
}

impl FileLayout {
    pub fn from_sizes(sizes: &[(RegionId, usize)]) -> Self {
        let mut regions = Vec::with_capacity(sizes.len());
        let mut cursor = 0usize;
        for &(id, len) in sizes {
            regions.push(RegionLayout {
                id,
                range: ByteRange {
                    start: cursor,
                    end: cursor + len,
                },
            });
            cursor += len;
        }
        Self {
            file_len: cursor,
            regions,
        }
    }

    pub fn region(&self, id: RegionId) -> Option<&RegionLayout> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn start_of(&self, id: RegionId) -> io::Result<usize> {
        self.region(id).map(|r| r.range.start).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("missing region {id:?}"),
            )
        })
    }

    /// Checks that the regions account for exactly `total` bytes.
    pub fn check_covers(&self, total: usize) -> io::Result<()> {
        if self.file_len != total {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "regions add up to {} bytes but the file holds {}",
                    self.file_len, total
                ),
            ));
        }
        Ok(())
    }
}
