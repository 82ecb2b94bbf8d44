use std::{
  error::Error,
  io::{IsTerminal, Read},
};

use explicit_alloc::{ExplicitAllocator, HeapSource};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
/// Skipped when stdin is not a terminal.
fn block_until_enter_pressed() {
  if !std::io::stdin().is_terminal() {
    return;
  }

  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

/// Prints every block between the prologue and the epilogue in address order.
fn print_heap<S: HeapSource>(allocator: &ExplicitAllocator<S>) {
  println!("    heap size = {} bytes", allocator.heap_size());

  for block in allocator.blocks() {
    println!("    {block}");
  }

  let free: Vec<_> = allocator
    .free_blocks()
    .map(|block| block.offset.to_string())
    .collect();
  println!("    free list: [{}]", free.join(" -> "));
}

fn main() -> Result<(), Box<dyn Error>> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

  print_program_break("start");

  let mut allocator = ExplicitAllocator::with_sbrk()?;

  println!("\n[0] Bootstrapped heap");
  print_program_break("after init");
  print_heap(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) A small request: the upper part of the initial block is handed out,
  //    the lower part stays on the free list.
  // --------------------------------------------------------------------
  let first = allocator.allocate(100)?.ok_or("no allocation")?;
  unsafe { first.as_ptr().write_bytes(0xAB, 100) };
  println!("\n[1] allocate(100) = {first:?}");
  print_heap(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Two more blocks, then free the one in the middle. It has allocated
  //    neighbors on both sides, so it joins the free list on its own.
  // --------------------------------------------------------------------
  let second = allocator.allocate(200)?.ok_or("no allocation")?;
  let third = allocator.allocate(300)?.ok_or("no allocation")?;
  unsafe { allocator.free(second.as_ptr()) };
  println!("\n[2] allocate(200), allocate(300), free the 200-byte block");
  print_heap(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Grow the first block. Its upper neighbor is the epilogue, so the
  //    payload moves and the old block is freed.
  // --------------------------------------------------------------------
  let first = unsafe { allocator.reallocate(first.as_ptr(), 400)? }.ok_or("no allocation")?;
  println!(
    "\n[3] reallocate(first, 400) = {first:?}, first byte = 0x{:X}",
    unsafe { first.as_ptr().read() }
  );
  print_heap(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A request larger than any free block grows the heap.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  let big = allocator.allocate(64 * 1024)?.ok_or("no allocation")?;
  println!("\n[4] allocate(64 KiB) = {big:?}");
  print_program_break("after large alloc");
  print_heap(&allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Free everything. Coalescing folds the heap back into one free block;
  //    the break itself never moves back down.
  // --------------------------------------------------------------------
  unsafe {
    allocator.free(first.as_ptr());
    allocator.free(third.as_ptr());
    allocator.free(big.as_ptr());
  }
  println!("\n[5] Freed everything");
  print_heap(&allocator);

  let stats = allocator.check()?;
  println!("\n{stats:#?}");

  Ok(())
}
