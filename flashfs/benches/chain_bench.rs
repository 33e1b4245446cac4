// SPDX-License-Identifier: MIT

use criterion::{Criterion, criterion_group, criterion_main};

use flashfs::chain::*;
use flashfs::slotted::SlotLayout;

criterion_group!(benches, chain_component_bench, slotted_bench);
criterion_main!(benches);

const SIZE_BYTES: u32 = 1024 * 1024;

fn capture(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7) as u8).collect()
}

pub fn chain_component_bench(c: &mut Criterion) {
    let data = capture(20_000);
    let mut buf = vec![0xFFu8; SIZE_BYTES as usize];
    let mut mem_io = MemFlash::new(&mut buf);

    {
        let mut fs = FlashFs::mount_chip(&mut mem_io).expect("mount failed");
        c.bench_function("chain_replace_20k_mem", |b| {
            b.iter(|| {
                fs.write_file("capture.bin", &data).expect("write failed");
            });
        });

        for i in 0..32 {
            fs.write_file(&format!("cycle_{i:02}.csv"), &data[..1500])
                .expect("write failed");
        }

        c.bench_function("chain_search", |b| {
            b.iter(|| {
                fs.search("cycle_31.csv").expect("search failed");
            });
        });

        let mut out = vec![0u8; data.len()];
        c.bench_function("chain_read_20k", |b| {
            b.iter(|| {
                fs.read_file("capture.bin", &mut out).expect("read failed");
            });
        });

        c.bench_function("chain_check", |b| {
            b.iter(|| {
                fs.check().expect("check failed");
            });
        });
    }

    c.bench_function("chain_mount", |b| {
        b.iter(|| {
            FlashFs::mount_chip(&mut mem_io).expect("mount failed");
        });
    });

    let mut file = tempfile::tempfile().expect("tempfile failed");
    let mut temp_io = StdFlash::new(&mut file, FlashGeometry::nor(SIZE_BYTES));
    temp_io.erase_all().expect("erase failed");
    let mut fs = FlashFs::mount_chip(&mut temp_io).expect("mount failed");

    c.bench_function("chain_replace_20k_file", |b| {
        b.iter(|| {
            fs.write_file("capture.bin", &data).expect("write failed");
        });
    });
}

pub fn slotted_bench(c: &mut Criterion) {
    let mut buf = vec![0xFFu8; 64 * 1024];
    let mut mem_io = MemFlash::new(&mut buf);
    let layout = SlotLayout::for_region(&mem_io, 64 * 1024);
    let mut fs = FlashFs::mount(&mut mem_io, layout).expect("mount failed");
    let data = capture(512);

    c.bench_function("slotted_fill_reclaim", |b| {
        b.iter(|| {
            for _ in 0..20 {
                fs.write_file("limits.cfg", &data).expect("write failed");
            }
            fs.remove_by_name("limits.cfg").expect("remove failed");
            fs.reclaim().expect("reclaim failed");
        });
    });
}
