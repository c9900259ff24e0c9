//! Arena allocator behavior: fill semantics, bulk free, and use from
//! multiple threads.

use cadscene::mem::SceneMemory;

#[test]
fn alloc_zeroes_and_tracks_blocks() {
    let memory = SceneMemory::new();
    assert_eq!(memory.block_count(), 0);
    let block = memory.alloc(64).expect("alloc failed");
    assert_eq!(block.len(), 64);
    assert!(block.iter().all(|&b| b == 0));
    memory.alloc(16).expect("alloc failed");
    assert_eq!(memory.block_count(), 2);
}

#[test]
fn zero_size_allocations_yield_nothing() {
    let memory = SceneMemory::new();
    assert!(memory.alloc(0).is_none());
    assert!(memory.alloc_filled(&[]).is_none());
    assert_eq!(memory.block_count(), 0);
}

#[test]
fn alloc_filled_copies_data() {
    let memory = SceneMemory::new();
    let block = memory.alloc_filled(b"hello").expect("alloc failed");
    assert_eq!(block, b"hello");
}

#[test]
fn alloc_partial_zeroes_the_tail() {
    let memory = SceneMemory::new();
    let block = memory.alloc_partial(8, b"abc").expect("alloc failed");
    assert_eq!(&block[..3], b"abc");
    assert_eq!(&block[3..], &[0; 5]);
}

#[test]
fn blocks_are_writable() {
    let memory = SceneMemory::new();
    let block = memory.alloc(4).expect("alloc failed");
    block.copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(block, &[1, 2, 3, 4]);
}

#[test]
fn clear_frees_everything_at_once() {
    let mut memory = SceneMemory::new();
    memory.alloc(8);
    memory.alloc(8);
    memory.alloc(8);
    assert_eq!(memory.block_count(), 3);
    memory.clear();
    assert_eq!(memory.block_count(), 0);
}

#[test]
fn concurrent_allocations() {
    let memory = SceneMemory::new();
    std::thread::scope(|scope| {
        for i in 1..=8usize {
            let memory = &memory;
            scope.spawn(move || {
                for _ in 0..100 {
                    let block = memory.alloc(i * 16).expect("alloc failed");
                    assert_eq!(block.len(), i * 16);
                    block[0] = i as u8;
                }
            });
        }
    });
    assert_eq!(memory.block_count(), 800);
}
