//! Filesystem drivers loaded from the RDB

mod common;

use common::{
    allocator, disk_bus, hunk_file, FsSpec, HunkSpec, MemoryBlockDevice, PartitionSpec,
    RdbImageBuilder, RecordingHost,
};
use mounter::{DeviceClass, FileSystemRegistry, ImageBus, MountConfig, Mounter, UnitOutcome};
use rdb::format::filesys::HandlerFields;
use rdb::types::long_at;
use rdb::DosType;

const PFS: DosType = DosType::from_bytes(*b"PFS\x03");

/// Code hunk pointing into the data and bss hunks
fn three_hunk_driver() -> Vec<u32> {
    hunk_file(&[
        HunkSpec::code(&[0, 0x10, 0x4E75_0000]).reloc(1, &[0]).reloc(2, &[4]),
        HunkSpec::data(&[0xDEAD_BEEF, 0x0000_0004]).reloc(0, &[4]),
        HunkSpec::bss(8),
    ])
}

fn driver_disk(version: u32, payload: Vec<u32>) -> Vec<u8> {
    RdbImageBuilder::new()
        .partition(PartitionSpec::new("PH0", PFS).bootable(0))
        .partition(PartitionSpec::new("PH1", PFS))
        .filesystem(FsSpec::new(PFS, version, payload))
        .build()
}

#[test]
fn test_driver_loaded_and_relocated() {
    let registry = FileSystemRegistry::new();
    let mut mounter = Mounter::with_registry(MountConfig::default(), &registry);
    let mut host = RecordingHost::native();
    let mut alloc = allocator();

    let summary = mounter.mount_all(
        &mut disk_bus(0, driver_disk(0x0013_0002, three_hunk_driver())),
        &mut alloc,
        &mut host,
    );

    assert_eq!(summary.mounted, 2);
    match summary.unit(0).unwrap().outcome {
        UnitOutcome::Rdb(scan) => assert_eq!(scan.filesystems_loaded, 1),
        other => panic!("unexpected outcome {:?}", other),
    }
    // Second partition reuses the entry
    assert_eq!(registry.len(), 1);
    assert_eq!(alloc.live(), 3);

    let seglist = registry
        .with_image(PFS, |image| {
            let hunks = image.hunks();
            assert_eq!(hunks.len(), 3);
            assert_eq!(long_at(hunks[0].data(), 0), hunks[1].base());
            assert_eq!(long_at(hunks[0].data(), 1), 0x10 + hunks[2].base());
            assert_eq!(long_at(hunks[0].data(), 2), 0x4E75_0000);
            assert_eq!(long_at(hunks[1].data(), 0), 0xDEAD_BEEF);
            assert_eq!(long_at(hunks[1].data(), 1), 4 + hunks[0].base());
            // Bss stays zeroed
            assert!(hunks[2].data().iter().all(|&b| b == 0));
            image.seglist_bptr()
        })
        .unwrap();

    let fs = registry.find(PFS).unwrap();
    assert_eq!(fs.version, 0x0013_0002);
    assert_eq!(fs.handler.get(HandlerFields::SEG_LIST), seglist);

    for name in ["PH0", "PH1"] {
        let node = &host.get(name).unwrap().node;
        assert_eq!(node.handler.get(HandlerFields::SEG_LIST), seglist);
        assert_eq!(node.handler.get(HandlerFields::STACK_SIZE), 4096);
        assert_eq!(node.handler.get(HandlerFields::PRIORITY), 5);
        assert_eq!(node.handler.get(HandlerFields::GLOBAL_VEC), 0xFFFF_FFFF);
    }
}

#[test]
fn test_driver_spanning_many_blocks() {
    // Large code hunk forces the image over several LSEG blocks
    let body: Vec<u32> = (0..700).collect();
    let payload = hunk_file(&[HunkSpec::code(&body).reloc(0, &[8, 400])]);

    let registry = FileSystemRegistry::new();
    let mut mounter = Mounter::with_registry(MountConfig::default(), &registry);
    let mut host = RecordingHost::native();
    mounter.mount_all(&mut disk_bus(0, driver_disk(1, payload)), &mut allocator(), &mut host);

    registry
        .with_image(PFS, |image| {
            let hunk = &image.hunks()[0];
            assert_eq!(hunk.size_longs(), 700);
            assert_eq!(long_at(hunk.data(), 1), 1);
            assert_eq!(long_at(hunk.data(), 2), 2 + hunk.base());
            assert_eq!(long_at(hunk.data(), 100), 100 + hunk.base());
            assert_eq!(long_at(hunk.data(), 699), 699);
        })
        .unwrap();
}

#[test]
fn test_chip_hunk_placement() {
    let payload = hunk_file(&[
        HunkSpec::code(&[0x4E75_0000]),
        HunkSpec::data(&[1, 2, 3]).chip(),
    ]);
    let registry = FileSystemRegistry::new();
    let mut mounter = Mounter::with_registry(MountConfig::default(), &registry);
    let mut alloc = allocator();
    mounter.mount_all(
        &mut disk_bus(0, driver_disk(1, payload)),
        &mut alloc,
        &mut RecordingHost::native(),
    );

    registry
        .with_image(PFS, |image| {
            assert!(!alloc.is_chip(image.hunks()[0].addr()));
            assert!(alloc.is_chip(image.hunks()[1].addr()));
        })
        .unwrap();
}

#[test]
fn test_bad_reloc_target_mounts_without_driver() {
    let payload = hunk_file(&[
        HunkSpec::code(&[0, 0]).reloc(5, &[0]),
        HunkSpec::data(&[0]),
    ]);
    let registry = FileSystemRegistry::new();
    let mut mounter = Mounter::with_registry(MountConfig::default(), &registry);
    let mut host = RecordingHost::native();
    let mut alloc = allocator();

    let summary = mounter.mount_all(&mut disk_bus(0, driver_disk(1, payload)), &mut alloc, &mut host);

    // Every allocation was returned
    assert!(registry.is_empty());
    assert_eq!(alloc.live(), 0);
    assert_eq!(alloc.allocations(), alloc.frees());
    assert!(alloc.allocations() > 0);

    // Partitions still mount, without a segment list
    assert_eq!(summary.mounted, 2);
    let node = &host.get("PH0").unwrap().node;
    assert_eq!(node.handler.get(HandlerFields::SEG_LIST), 0);
}

#[test]
fn test_newer_version_replaces() {
    let mut bus = ImageBus::new();
    bus.attach(0, DeviceClass::Disk, MemoryBlockDevice::new(driver_disk(40 << 16, three_hunk_driver())));
    bus.attach(1, DeviceClass::Disk, MemoryBlockDevice::new(driver_disk(45 << 16, three_hunk_driver())));
    bus.attach(2, DeviceClass::Disk, MemoryBlockDevice::new(driver_disk(42 << 16, three_hunk_driver())));

    let registry = FileSystemRegistry::new();
    let mut mounter = Mounter::with_registry(MountConfig::default().creator("A4091"), &registry);
    let mut host = RecordingHost::native();
    let summary = mounter.mount_all(&mut bus, &mut allocator(), &mut host);

    let loaded: Vec<u32> = [0, 1, 2]
        .iter()
        .map(|&u| match summary.unit(u).unwrap().outcome {
            UnitOutcome::Rdb(scan) => scan.filesystems_loaded,
            other => panic!("unexpected outcome {:?}", other),
        })
        .collect();
    assert_eq!(loaded, [1, 1, 0]);

    let entries = registry.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].fs.version, 45 << 16);
    assert_eq!(entries[0].creator, "A4091");
    assert_eq!(format!("{}", entries[0]), "PFS3  45.0  A4091");

    // Nodes of the last disk use the newest driver
    let newest = registry.find(PFS).unwrap().handler.get(HandlerFields::SEG_LIST);
    assert_eq!(
        host.get("PH0.2").unwrap().node.handler.get(HandlerFields::SEG_LIST),
        newest
    );
}

#[test]
fn test_partition_without_driver() {
    // FSHD for another dostype only
    let image = RdbImageBuilder::new()
        .partition(PartitionSpec::new("DH0", DosType::FFS))
        .filesystem(FsSpec::new(PFS, 1, three_hunk_driver()))
        .build();
    let registry = FileSystemRegistry::new();
    let mut mounter = Mounter::with_registry(MountConfig::default(), &registry);
    let mut host = RecordingHost::native();
    let mut alloc = allocator();
    let summary = mounter.mount_all(&mut disk_bus(0, image), &mut alloc, &mut host);

    assert_eq!(summary.mounted, 1);
    assert!(registry.is_empty());
    assert_eq!(alloc.allocations(), 0);
}
