/// Programming-contract violations rejected by the syscall gateway before
/// any trap occurs. Recoverable runtime failures (allocation exhausted,
/// handle slot missing, unknown pid) are sentinel values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    #[error("size {0} is not a positive multiple of the page size")]
    MisalignedSize(usize),

    #[error("address {0:#x} is not page aligned")]
    MisalignedAddress(u32),

    #[error("device name is empty")]
    EmptyName,
}
