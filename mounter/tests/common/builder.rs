//! RDB disk image builder for tests

use rdb::block::checksum::fix_checksum;
use rdb::format::filesys::HandlerFields;
use rdb::format::partition::{DRIVE_NAME_OFFSET, ENVIRONMENT_LONG, PBFF_BOOTABLE, PBFF_NOMOUNT};
use rdb::format::loadseg::{data_longs, LOAD_DATA_LONG};
use rdb::hunk::{HUNKF_CHIP, HUNK_BSS, HUNK_CODE, HUNK_DATA, HUNK_END, HUNK_HEADER, HUNK_RELOC32};
use rdb::types::{
    put_be_u32, END_OF_CHAIN, IDNAME_FILESYSHEADER, IDNAME_LOADSEG, IDNAME_PARTITION,
    IDNAME_RIGIDDISK, RDB_LOCATION_LIMIT,
};
use rdb::DosType;

/// One partition to put on the disk
#[derive(Debug, Clone)]
pub struct PartitionSpec {
    pub name: String,
    pub flags: u32,
    pub dev_flags: u32,
    pub boot_pri: i32,
    pub dos_type: DosType,
    pub low_cyl: u32,
    pub high_cyl: u32,
}

impl PartitionSpec {
    pub fn new(name: &str, dos_type: DosType) -> Self {
        Self {
            name: name.to_string(),
            flags: 0,
            dev_flags: 0,
            boot_pri: 0,
            dos_type,
            low_cyl: 2,
            high_cyl: 101,
        }
    }

    pub fn bootable(mut self, pri: i32) -> Self {
        self.flags |= PBFF_BOOTABLE;
        self.boot_pri = pri;
        self
    }

    pub fn no_mount(mut self) -> Self {
        self.flags |= PBFF_NOMOUNT;
        self
    }
}

/// One hunk of a generated executable
#[derive(Debug, Clone)]
pub struct HunkSpec {
    kind: u32,
    size: u32,
    chip: bool,
    data: Vec<u32>,
    relocs: Vec<(u32, Vec<u32>)>,
}

impl HunkSpec {
    pub fn code(data: &[u32]) -> Self {
        Self::with_data(HUNK_CODE, data)
    }

    pub fn data(data: &[u32]) -> Self {
        Self::with_data(HUNK_DATA, data)
    }

    pub fn bss(size: u32) -> Self {
        Self {
            kind: HUNK_BSS,
            size,
            chip: false,
            data: Vec::new(),
            relocs: Vec::new(),
        }
    }

    fn with_data(kind: u32, data: &[u32]) -> Self {
        Self {
            kind,
            size: data.len() as u32,
            chip: false,
            data: data.to_vec(),
            relocs: Vec::new(),
        }
    }

    pub fn chip(mut self) -> Self {
        self.chip = true;
        self
    }

    /// Add `target`'s base at each byte offset
    pub fn reloc(mut self, target: u32, offsets: &[u32]) -> Self {
        self.relocs.push((target, offsets.to_vec()));
        self
    }
}

/// Encode hunks as a load file
pub fn hunk_file(hunks: &[HunkSpec]) -> Vec<u32> {
    let n = hunks.len() as u32;
    let mut out = vec![HUNK_HEADER, 0, n, 0, n - 1];
    for h in hunks {
        out.push(h.size | if h.chip { HUNKF_CHIP } else { 0 });
    }
    for h in hunks {
        out.push(h.kind);
        out.push(h.size);
        if h.kind != HUNK_BSS {
            out.extend_from_slice(&h.data);
        }
        if !h.relocs.is_empty() {
            out.push(HUNK_RELOC32);
            for (target, offsets) in &h.relocs {
                out.push(offsets.len() as u32);
                out.push(*target);
                out.extend_from_slice(offsets);
            }
            out.push(0);
        }
        out.push(HUNK_END);
    }
    out
}

/// A filesystem driver stored on the disk
#[derive(Debug, Clone)]
pub struct FsSpec {
    pub dos_type: DosType,
    pub version: u32,
    pub patch_flags: u32,
    pub handler: [u32; 9],
    pub payload: Vec<u32>,
}

impl FsSpec {
    /// Driver patching stack size, priority and segment list
    pub fn new(dos_type: DosType, version: u32, payload: Vec<u32>) -> Self {
        Self {
            dos_type,
            version,
            patch_flags: (1 << HandlerFields::STACK_SIZE)
                | (1 << HandlerFields::PRIORITY)
                | (1 << HandlerFields::SEG_LIST)
                | (1 << HandlerFields::GLOBAL_VEC),
            handler: [0, 0, 0, 0, 4096, 5, 0, 0, 0xFFFF_FFFF],
            payload,
        }
    }
}

/// Builds disk images carrying an RDB
#[derive(Debug, Clone)]
pub struct RdbImageBuilder {
    block_size: usize,
    rdb_block: u32,
    flags: u32,
    partitions: Vec<PartitionSpec>,
    filesystems: Vec<FsSpec>,
    corrupt_partition: Option<usize>,
    partition_cycle: bool,
}

impl Default for RdbImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RdbImageBuilder {
    pub fn new() -> Self {
        Self {
            block_size: 512,
            rdb_block: 0,
            flags: 0,
            partitions: Vec::new(),
            filesystems: Vec::new(),
            corrupt_partition: None,
            partition_cycle: false,
        }
    }

    /// Session block size; blocks stay addressed in 512-byte units
    pub fn block_size(mut self, bs: usize) -> Self {
        self.block_size = bs;
        self
    }

    pub fn rdb_at(mut self, block: u32) -> Self {
        self.rdb_block = block;
        self
    }

    /// `RDBFF_*` flags
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn partition(mut self, part: PartitionSpec) -> Self {
        self.partitions.push(part);
        self
    }

    pub fn filesystem(mut self, fs: FsSpec) -> Self {
        self.filesystems.push(fs);
        self
    }

    /// Break the checksum of partition `index`
    pub fn corrupt_partition(mut self, index: usize) -> Self {
        self.corrupt_partition = Some(index);
        self
    }

    /// Link the last partition back to the first
    pub fn partition_cycle(mut self) -> Self {
        self.partition_cycle = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let step = (self.block_size / 512) as u32;
        let mut next = RDB_LOCATION_LIMIT;
        let mut alloc = |count: u32| {
            let first = next;
            next += count * step;
            first
        };

        let part_blocks: Vec<u32> = self.partitions.iter().map(|_| alloc(1)).collect();
        let fshd_blocks: Vec<u32> = self.filesystems.iter().map(|_| alloc(1)).collect();
        let per_block = data_longs(self.block_size);
        let lseg_blocks: Vec<Vec<u32>> = self
            .filesystems
            .iter()
            .map(|fs| {
                let n = fs.payload.len().div_ceil(per_block).max(1) as u32;
                (0..n).map(|_| alloc(1)).collect()
            })
            .collect();
        let total = next + step;

        let mut data = vec![0u8; total as usize * 512];

        // RDSK
        let mut rdsk = self.block(IDNAME_RIGIDDISK);
        self.put(&mut rdsk, 3, 7);
        self.put(&mut rdsk, 4, self.block_size as u32);
        self.put(&mut rdsk, 5, self.flags);
        self.put(&mut rdsk, 6, END_OF_CHAIN);
        self.put(&mut rdsk, 7, head(&part_blocks));
        self.put(&mut rdsk, 8, head(&fshd_blocks));
        self.put(&mut rdsk, 9, END_OF_CHAIN);
        self.store(&mut data, self.rdb_block, rdsk, false);

        for (i, part) in self.partitions.iter().enumerate() {
            let mut b = self.block(IDNAME_PARTITION);
            let next = match part_blocks.get(i + 1) {
                Some(&n) => n,
                None if self.partition_cycle => part_blocks[0],
                None => END_OF_CHAIN,
            };
            self.put(&mut b, 4, next);
            self.put(&mut b, 5, part.flags);
            self.put(&mut b, 8, part.dev_flags);
            b[DRIVE_NAME_OFFSET] = part.name.len() as u8;
            b[DRIVE_NAME_OFFSET + 1..DRIVE_NAME_OFFSET + 1 + part.name.len()]
                .copy_from_slice(part.name.as_bytes());
            let env = [
                16,
                128,
                0,
                1,
                1,
                32,
                2,
                0,
                0,
                part.low_cyl,
                part.high_cyl,
                30,
                0,
                0x0001_FE00,
                0x7FFF_FFFE,
                part.boot_pri as u32,
                part.dos_type.0,
            ];
            for (j, v) in env.iter().enumerate() {
                self.put(&mut b, ENVIRONMENT_LONG + j, *v);
            }
            self.store(&mut data, part_blocks[i], b, self.corrupt_partition == Some(i));
        }

        for (i, fs) in self.filesystems.iter().enumerate() {
            let mut b = self.block(IDNAME_FILESYSHEADER);
            self.put(&mut b, 4, fshd_blocks.get(i + 1).copied().unwrap_or(END_OF_CHAIN));
            self.put(&mut b, 8, fs.dos_type.0);
            self.put(&mut b, 9, fs.version);
            self.put(&mut b, 10, fs.patch_flags);
            for (j, v) in fs.handler.iter().enumerate() {
                self.put(&mut b, 11 + j, *v);
            }
            self.put(&mut b, 11 + HandlerFields::SEG_LIST, lseg_blocks[i][0]);
            self.store(&mut data, fshd_blocks[i], b, false);

            let blocks = &lseg_blocks[i];
            for (k, &at) in blocks.iter().enumerate() {
                let mut b = self.block(IDNAME_LOADSEG);
                let next = blocks.get(k + 1).copied().unwrap_or(END_OF_CHAIN);
                self.put(&mut b, 4, next);
                let chunk = fs.payload.iter().skip(k * per_block).take(per_block);
                for (j, v) in chunk.enumerate() {
                    self.put(&mut b, LOAD_DATA_LONG + j, *v);
                }
                self.store(&mut data, at, b, false);
            }
        }
        data
    }

    fn block(&self, id: u32) -> Vec<u8> {
        let mut b = vec![0u8; self.block_size];
        put_be_u32(&mut b, 0, id);
        put_be_u32(&mut b, 4, (self.block_size / 4) as u32);
        b
    }

    fn put(&self, b: &mut [u8], long: usize, value: u32) {
        put_be_u32(b, long * 4, value);
    }

    fn store(&self, data: &mut [u8], block: u32, mut b: Vec<u8>, corrupt: bool) {
        fix_checksum(&mut b);
        if corrupt {
            b[100] ^= 0x40;
        }
        let at = block as usize * 512;
        data[at..at + b.len()].copy_from_slice(&b);
    }
}

fn head(blocks: &[u32]) -> u32 {
    blocks.first().copied().unwrap_or(END_OF_CHAIN)
}
