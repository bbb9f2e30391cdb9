#![no_main]
use arbitrary::Arbitrary;
use heapfile_rs::HeapFile;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Alloc { size: u8, id: i8 },
    Free { pick: u8 },
    Write { pick: u8, value: u32 },
    Offset { pick: u8, delta: i16 },
    Shrink,
    Reopen,
}

fuzz_target!(|ops: Vec<Op>| {
    let temp = match tempfile::tempdir() {
        Ok(t) => t,
        Err(_) => return,
    };
    let path = temp.path().join("fuzz.hpf");
    let mut heap = HeapFile::open(&path).unwrap();
    let mut live = Vec::new();

    for op in ops.into_iter().take(256) {
        match op {
            Op::Alloc { size, id } => {
                if let Ok(h) = heap.allocate(size as i64, id as i64) {
                    assert!(h.end() <= heap.len());
                    live.push(h);
                }
            }
            Op::Free { pick } if !live.is_empty() => {
                let h = live.swap_remove(pick as usize % live.len());
                heap.free(&h).unwrap();
            }
            Op::Write { pick, value } if !live.is_empty() => {
                let h = live[pick as usize % live.len()];
                if heap.write(&h, value).is_ok() {
                    assert_eq!(heap.read::<u32>(&h).unwrap(), value);
                }
            }
            Op::Offset { pick, delta } if !live.is_empty() => {
                let h = live[pick as usize % live.len()];
                if let Ok(sub) = heap.pointer_offset(&h, delta as i64) {
                    assert!(sub.size() >= 1 && sub.end() <= heap.len());
                }
            }
            Op::Shrink => {
                heap.shrink().unwrap();
            }
            Op::Reopen => {
                heap.close().unwrap();
                heap = HeapFile::open(&path).unwrap();
            }
            _ => {}
        }

        heap.directory().validate(heap.len()).unwrap();
    }

    heap.close().unwrap();
});
