//! Property-based tests for allocator correctness
//!
//! Uses proptest to verify allocator invariants hold across many random scenarios

use heapfile_rs::{HeapFile, HeapFileExt};
use proptest::prelude::*;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Alloc(i64),
    Free(usize),
    Shrink,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1i64..64).prop_map(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Free),
        1 => Just(Op::Shrink),
    ]
}

proptest! {
    #[test]
    fn prop_allocation_within_file(sizes in prop::collection::vec(1i64..512, 1..40)) {
        let temp = TempDir::new().unwrap();
        let mut heap = HeapFile::open(temp.path().join("prop.hpf")).unwrap();

        for (id, size) in sizes.iter().enumerate() {
            let handle = heap.allocate(*size, id as i64).unwrap();
            prop_assert_eq!(handle.size(), *size);
            prop_assert!(handle.end() <= heap.len());
        }

        heap.close().unwrap();
    }

    #[test]
    fn prop_reuse_does_not_grow(size in 1i64..256, request in 1i64..256) {
        prop_assume!(request <= size);

        let temp = TempDir::new().unwrap();
        let mut heap = HeapFile::open(temp.path().join("prop.hpf")).unwrap();

        let victim = heap.allocate(size, 0).unwrap();
        heap.allocate(8, 1).unwrap();
        heap.free(&victim).unwrap();

        let before = heap.len();
        let reused = heap.allocate(request, 2).unwrap();
        prop_assert_eq!(reused.offset(), victim.offset());
        prop_assert_eq!(heap.len(), before);

        let remainders: Vec<_> = heap.handles().filter(|h| h.is_freed()).copied().collect();
        if request < size {
            prop_assert_eq!(remainders.len(), 1);
            prop_assert_eq!(remainders[0].offset(), victim.offset() + request);
            prop_assert_eq!(remainders[0].size(), size - request);
        } else {
            prop_assert!(remainders.is_empty());
        }

        heap.close().unwrap();
    }

    #[test]
    fn prop_blocks_never_overlap(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let temp = TempDir::new().unwrap();
        let mut heap = HeapFile::open(temp.path().join("prop.hpf")).unwrap();
        let mut live = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::Alloc(size) => live.push(heap.allocate(size, step as i64).unwrap()),
                Op::Free(pick) if !live.is_empty() => {
                    let handle = live.swap_remove(pick % live.len());
                    heap.free(&handle).unwrap();
                }
                Op::Free(_) => {}
                Op::Shrink => {
                    heap.shrink().unwrap();
                }
            }

            prop_assert!(heap.directory().validate(heap.len()).is_ok());
            for handle in &live {
                prop_assert!(heap.is_live(handle));
            }
        }

        heap.close().unwrap();
    }

    #[test]
    fn prop_persistence_roundtrip(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prop.hpf");
        let mut heap = HeapFile::open(&path).unwrap();
        let mut live = Vec::new();

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::Alloc(size) => live.push(heap.allocate(size, step as i64).unwrap()),
                Op::Free(pick) if !live.is_empty() => {
                    let handle = live.swap_remove(pick % live.len());
                    heap.free(&handle).unwrap();
                }
                Op::Free(_) => {}
                Op::Shrink => {
                    heap.shrink().unwrap();
                }
            }
        }

        let mut before: Vec<_> = heap.handles().copied().collect();
        heap.close().unwrap();

        let heap = HeapFile::open(&path).unwrap();
        let mut after: Vec<_> = heap.handles().copied().collect();

        before.sort_by_key(|h| h.offset());
        after.sort_by_key(|h| h.offset());
        prop_assert_eq!(before, after);

        heap.close().unwrap();
    }

    #[test]
    fn prop_i64_roundtrip(value in any::<i64>()) {
        let temp = TempDir::new().unwrap();
        let mut heap = HeapFile::open(temp.path().join("prop.hpf")).unwrap();

        let handle = heap.allocate_typed::<i64>(0).unwrap();
        heap.write(&handle, value).unwrap();
        prop_assert_eq!(heap.read::<i64>(&handle).unwrap(), value);

        heap.close().unwrap();
    }

    #[test]
    fn prop_string_roundtrip(text in "\\PC{0,40}") {
        let temp = TempDir::new().unwrap();
        let mut heap = HeapFile::open(temp.path().join("prop.hpf")).unwrap();

        let handle = heap.allocate_string(&text, 0).unwrap();
        heap.write_string(&handle, &text).unwrap();
        prop_assert_eq!(heap.read_string(&handle).unwrap(), text);

        heap.close().unwrap();
    }
}
