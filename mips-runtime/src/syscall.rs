//! Operating system services
//!
//! Handles the `syscall` instruction. The service number is in `$v0` and
//! arguments in `$a0`-`$a1` or `$f12`; results go to `$v0` or `$f0`.
//!
//! - 1/2/3/4: print int, float, double, string
//! - 5/6/7/8: read int, float, double, string
//! - 9: sbrk
//! - 10/17: exit, exit with code
//! - 11/12: print char, read char
//! - 34/35/36: print int as hex, binary, unsigned

use crate::error::{Result, RuntimeError};
use crate::io::Channels;
use crate::memory::Memory;
use crate::registers::RegisterCollection;
use mips_spec::{FpuRegister, Register, HEAP_BASE};
use std::str::FromStr;

/// Service numbers
pub const SYSCALL_PRINT_INT: u32 = 1;
pub const SYSCALL_PRINT_FLOAT: u32 = 2;
pub const SYSCALL_PRINT_DOUBLE: u32 = 3;
pub const SYSCALL_PRINT_STRING: u32 = 4;
pub const SYSCALL_READ_INT: u32 = 5;
pub const SYSCALL_READ_FLOAT: u32 = 6;
pub const SYSCALL_READ_DOUBLE: u32 = 7;
pub const SYSCALL_READ_STRING: u32 = 8;
pub const SYSCALL_SBRK: u32 = 9;
pub const SYSCALL_EXIT: u32 = 10;
pub const SYSCALL_PRINT_CHAR: u32 = 11;
pub const SYSCALL_READ_CHAR: u32 = 12;
pub const SYSCALL_EXIT2: u32 = 17;
pub const SYSCALL_PRINT_HEX: u32 = 34;
pub const SYSCALL_PRINT_BINARY: u32 = 35;
pub const SYSCALL_PRINT_UNSIGNED: u32 = 36;

/// Longest string `print_string` follows before giving up
const MAX_STRING: u32 = 1 << 16;

const F0: FpuRegister = FpuRegister::F0;
const F12: FpuRegister = FpuRegister::F12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// Serviced; the core may continue
    Continue,
    /// Input not available yet, or not enough room for output
    WouldBlock,
    Exit(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallService {
    heap_pointer: u32,
}

impl Default for SyscallService {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallService {
    pub fn new() -> Self {
        Self {
            heap_pointer: HEAP_BASE,
        }
    }

    /// Next address `sbrk` hands out
    pub fn heap_pointer(&self) -> u32 {
        self.heap_pointer
    }

    /// Service the syscall raised at `pc`
    pub fn handle<M: Memory + ?Sized>(
        &mut self,
        regs: &mut RegisterCollection,
        memory: &mut M,
        channels: &mut Channels,
        pc: u32,
    ) -> Result<SyscallOutcome> {
        let service = regs.gpr(Register::V0);
        let a0 = regs.gpr(Register::A0);
        tracing::debug!("syscall {} at PC {:#010x}", service, pc);

        match service {
            SYSCALL_PRINT_INT => print(channels, &(a0 as i32).to_string()),
            SYSCALL_PRINT_FLOAT => print(channels, &format!("{:?}", regs.single(F12))),
            SYSCALL_PRINT_DOUBLE => {
                let value = regs.double(F12).ok_or_else(|| {
                    RuntimeError::InvalidSyscallArgument("$f12 does not hold a double".into())
                })?;
                print(channels, &format!("{:?}", value))
            }
            SYSCALL_PRINT_STRING => {
                let text = read_c_string(memory, a0)?;
                print(channels, &text)
            }
            SYSCALL_PRINT_CHAR => print(channels, &char::from(a0 as u8).to_string()),
            SYSCALL_PRINT_HEX => print(channels, &format!("{:#010x}", a0)),
            SYSCALL_PRINT_BINARY => print(channels, &format!("{:032b}", a0)),
            SYSCALL_PRINT_UNSIGNED => print(channels, &a0.to_string()),

            SYSCALL_READ_INT => Ok(read_value::<i32>(channels)?.map_or(SyscallOutcome::WouldBlock, |v| {
                regs.set_gpr(Register::V0, v as u32);
                SyscallOutcome::Continue
            })),
            SYSCALL_READ_FLOAT => Ok(read_value::<f32>(channels)?.map_or(SyscallOutcome::WouldBlock, |v| {
                regs.set_single(F0, v);
                SyscallOutcome::Continue
            })),
            SYSCALL_READ_DOUBLE => Ok(read_value::<f64>(channels)?.map_or(SyscallOutcome::WouldBlock, |v| {
                regs.set_double(F0, v);
                SyscallOutcome::Continue
            })),
            SYSCALL_READ_STRING => {
                let length = regs.gpr(Register::A1);
                self.read_string(memory, channels, a0, length)
            }
            SYSCALL_READ_CHAR => match channels.stdin.try_pop() {
                Some(c) => {
                    regs.set_gpr(Register::V0, c as u32);
                    Ok(SyscallOutcome::Continue)
                }
                None if channels.stdin.is_closed() => Err(RuntimeError::EndOfInput),
                None => Ok(SyscallOutcome::WouldBlock),
            },

            SYSCALL_SBRK => {
                let bytes = a0 as i32;
                if bytes < 0 {
                    return Err(RuntimeError::InvalidSyscallArgument(format!(
                        "sbrk of negative size {}",
                        bytes
                    )));
                }
                regs.set_gpr(Register::V0, self.heap_pointer);
                let rounded = (bytes as u32).wrapping_add(3) & !3;
                self.heap_pointer = self.heap_pointer.wrapping_add(rounded);
                Ok(SyscallOutcome::Continue)
            }

            SYSCALL_EXIT => Ok(SyscallOutcome::Exit(0)),
            SYSCALL_EXIT2 => Ok(SyscallOutcome::Exit(a0 as i32)),

            _ => Err(RuntimeError::UnknownSyscall { service, pc }),
        }
    }

    /// Read a line into the buffer at `address`, at most `length - 1`
    /// characters followed by a terminating zero
    ///
    /// The newline is kept when the input had one.
    fn read_string<M: Memory + ?Sized>(
        &self,
        memory: &mut M,
        channels: &mut Channels,
        address: u32,
        length: u32,
    ) -> Result<SyscallOutcome> {
        if length == 0 {
            return Ok(SyscallOutcome::Continue);
        }
        let line = match channels.stdin.take_line() {
            Some(line) => line,
            None if channels.stdin.at_end() => return Err(RuntimeError::EndOfInput),
            None => return Ok(SyscallOutcome::WouldBlock),
        };
        let mut bytes: Vec<u8> = line.chars().map(|c| c as u8).collect();
        bytes.truncate(length as usize - 1);
        bytes.push(0);
        memory.write_bytes(address, &bytes)?;
        Ok(SyscallOutcome::Continue)
    }
}

fn print(channels: &mut Channels, text: &str) -> Result<SyscallOutcome> {
    let stdout = &mut channels.stdout;
    let needed = text.chars().count();
    if needed > stdout.capacity() {
        return Err(RuntimeError::ChannelFull);
    }
    if needed > stdout.available() {
        return Ok(SyscallOutcome::WouldBlock);
    }
    stdout.push_str(text);
    Ok(SyscallOutcome::Continue)
}

/// Parse the next stdin line; `None` until a full line is available
fn read_value<T: FromStr>(channels: &mut Channels) -> Result<Option<T>> {
    match channels.stdin.take_line() {
        Some(line) => line.trim().parse().map(Some).map_err(|_| {
            RuntimeError::InvalidSyscallArgument(format!("cannot parse `{}`", line.trim()))
        }),
        None if channels.stdin.at_end() => Err(RuntimeError::EndOfInput),
        None => Ok(None),
    }
}

fn read_c_string<M: Memory + ?Sized>(memory: &M, address: u32) -> Result<String> {
    let mut text = String::new();
    for offset in 0..MAX_STRING {
        match memory.read_byte(address.wrapping_add(offset))? {
            0 => return Ok(text),
            byte => text.push(char::from(byte)),
        }
    }
    Err(RuntimeError::InvalidSyscallArgument(format!(
        "string at {:#010x} is not terminated",
        address
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SparseMemory;

    struct Harness {
        service: SyscallService,
        regs: RegisterCollection,
        memory: SparseMemory,
        channels: Channels,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                service: SyscallService::new(),
                regs: RegisterCollection::new(),
                memory: SparseMemory::new(),
                channels: Channels::new(64),
            }
        }

        fn call(&mut self, service: u32, a0: u32) -> Result<SyscallOutcome> {
            self.regs.set_gpr(Register::V0, service);
            self.regs.set_gpr(Register::A0, a0);
            self.service
                .handle(&mut self.regs, &mut self.memory, &mut self.channels, 0x0040_0000)
        }

        fn stdout(&mut self) -> String {
            self.channels.stdout.drain_string()
        }
    }

    #[test]
    fn test_print_integers() {
        let mut h = Harness::new();
        h.call(SYSCALL_PRINT_INT, (-5i32) as u32).unwrap();
        h.call(SYSCALL_PRINT_CHAR, b' ' as u32).unwrap();
        h.call(SYSCALL_PRINT_UNSIGNED, u32::MAX).unwrap();
        h.call(SYSCALL_PRINT_CHAR, b' ' as u32).unwrap();
        h.call(SYSCALL_PRINT_HEX, 255).unwrap();
        assert_eq!(h.stdout(), "-5 4294967295 0x000000ff");

        h.call(SYSCALL_PRINT_BINARY, 5).unwrap();
        assert_eq!(h.stdout(), "00000000000000000000000000000101");
    }

    #[test]
    fn test_print_floats() {
        let mut h = Harness::new();
        h.regs.set_single(F12, 1.5);
        h.call(SYSCALL_PRINT_FLOAT, 0).unwrap();
        h.regs.set_double(F12, 2.0);
        h.call(SYSCALL_PRINT_DOUBLE, 0).unwrap();
        assert_eq!(h.stdout(), "1.52.0");
    }

    #[test]
    fn test_print_string() {
        let mut h = Harness::new();
        h.memory.write_bytes(0x1001_0000, b"hi!\0ignored").unwrap();
        assert_eq!(h.call(SYSCALL_PRINT_STRING, 0x1001_0000), Ok(SyscallOutcome::Continue));
        assert_eq!(h.stdout(), "hi!");
    }

    #[test]
    fn test_output_backpressure() {
        let mut h = Harness::new();
        h.channels.stdout.push_str(&"x".repeat(62));
        assert_eq!(h.call(SYSCALL_PRINT_INT, 1234), Ok(SyscallOutcome::WouldBlock));
        assert_eq!(h.stdout().len(), 62);
        assert_eq!(h.call(SYSCALL_PRINT_INT, 1234), Ok(SyscallOutcome::Continue));

        let long = vec![b'a'; 100];
        h.memory.write_bytes(0x1001_0000, &long).unwrap();
        assert_eq!(h.call(SYSCALL_PRINT_STRING, 0x1001_0000), Err(RuntimeError::ChannelFull));
    }

    #[test]
    fn test_read_int_blocks_until_line() {
        let mut h = Harness::new();
        assert_eq!(h.call(SYSCALL_READ_INT, 0), Ok(SyscallOutcome::WouldBlock));
        h.channels.stdin.push_str("-4");
        assert_eq!(h.call(SYSCALL_READ_INT, 0), Ok(SyscallOutcome::WouldBlock));
        h.channels.stdin.push_str("2\n");
        assert_eq!(h.call(SYSCALL_READ_INT, 0), Ok(SyscallOutcome::Continue));
        assert_eq!(h.regs.gpr(Register::V0) as i32, -42);
    }

    #[test]
    fn test_read_int_rejects_garbage() {
        let mut h = Harness::new();
        h.channels.stdin.push_str("abc\n");
        assert!(matches!(
            h.call(SYSCALL_READ_INT, 0),
            Err(RuntimeError::InvalidSyscallArgument(_))
        ));
    }

    #[test]
    fn test_read_floats() {
        let mut h = Harness::new();
        h.channels.stdin.push_str("0.25\n-3e2\n");
        h.call(SYSCALL_READ_FLOAT, 0).unwrap();
        assert_eq!(h.regs.single(F0), 0.25);
        h.call(SYSCALL_READ_DOUBLE, 0).unwrap();
        assert_eq!(h.regs.double(F0), Some(-300.0));
    }

    #[test]
    fn test_read_string_truncates() {
        let mut h = Harness::new();
        h.channels.stdin.push_str("hello\n");
        h.regs.set_gpr(Register::A1, 4);
        h.call(SYSCALL_READ_STRING, 0x1001_0000).unwrap();
        assert_eq!(read_c_string(&h.memory, 0x1001_0000).unwrap(), "hel");

        h.channels.stdin.push_str("ok\n");
        h.regs.set_gpr(Register::A1, 8);
        h.call(SYSCALL_READ_STRING, 0x1001_0010).unwrap();
        assert_eq!(read_c_string(&h.memory, 0x1001_0010).unwrap(), "ok\n");
    }

    #[test]
    fn test_read_string_unterminated_final_line() {
        let mut h = Harness::new();
        h.channels.stdin.push_str("first\nlast");
        h.channels.stdin.close();
        h.regs.set_gpr(Register::A1, 16);
        h.call(SYSCALL_READ_STRING, 0x1001_0000).unwrap();
        assert_eq!(read_c_string(&h.memory, 0x1001_0000).unwrap(), "first\n");
        h.call(SYSCALL_READ_STRING, 0x1001_0000).unwrap();
        assert_eq!(read_c_string(&h.memory, 0x1001_0000).unwrap(), "last");
        assert_eq!(
            h.call(SYSCALL_READ_STRING, 0x1001_0000),
            Err(RuntimeError::EndOfInput)
        );
    }

    #[test]
    fn test_read_char_and_end_of_input() {
        let mut h = Harness::new();
        assert_eq!(h.call(SYSCALL_READ_CHAR, 0), Ok(SyscallOutcome::WouldBlock));
        h.channels.stdin.push_str("z");
        h.channels.stdin.close();
        h.call(SYSCALL_READ_CHAR, 0).unwrap();
        assert_eq!(h.regs.gpr(Register::V0), 'z' as u32);
        assert_eq!(h.call(SYSCALL_READ_CHAR, 0), Err(RuntimeError::EndOfInput));
        assert_eq!(h.call(SYSCALL_READ_INT, 0), Err(RuntimeError::EndOfInput));
    }

    #[test]
    fn test_sbrk() {
        let mut h = Harness::new();
        h.call(SYSCALL_SBRK, 10).unwrap();
        assert_eq!(h.regs.gpr(Register::V0), HEAP_BASE);
        h.call(SYSCALL_SBRK, 4).unwrap();
        assert_eq!(h.regs.gpr(Register::V0), HEAP_BASE + 12);
        assert_eq!(h.service.heap_pointer(), HEAP_BASE + 16);
    }

    #[test]
    fn test_exit_and_unknown() {
        let mut h = Harness::new();
        assert_eq!(h.call(SYSCALL_EXIT, 9), Ok(SyscallOutcome::Exit(0)));
        assert_eq!(h.call(SYSCALL_EXIT2, 9), Ok(SyscallOutcome::Exit(9)));
        assert_eq!(
            h.call(99, 0),
            Err(RuntimeError::UnknownSyscall {
                service: 99,
                pc: 0x0040_0000
            })
        );
    }
}
