//! Agent VM and scale set name parsing.
//!
//! Name layouts produced by the template generator:
//!
//! | Kind | Layout | Example |
//! |---|---|---|
//! | Linux VM | `{3}-{pool}-{8 hex}-{index}` | `k8s-agentpool1-12345678-4` |
//! | Windows VM | `{4 hex}{3}{900 + pool index}{index}` | `2952k8s9012` |
//! | Windows scale set | `{4 hex}{3}{900 + pool index}[vmss]` | `2952k8s901vmss` |

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const LINUX_VM_NAME: &str = r"^[0-9a-zA-Z]{3}-(.+)-([0-9a-fA-F]{8})-{0,2}([0-9]+)$";
const WINDOWS_VM_NAME: &str = r"^([a-fA-F0-9]{4})([0-9a-zA-Z]{3})([0-9]{4,8})$";
const WINDOWS_SCALE_SET_NAME: &str = r"^([a-fA-F0-9]{4})([0-9a-zA-Z]{3})([0-9]{3})(vmss)?$";

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static LINUX_VM_NAME_RE: Pattern = LazyLock::new(|| Regex::new(LINUX_VM_NAME));
static WINDOWS_VM_NAME_RE: Pattern = LazyLock::new(|| Regex::new(WINDOWS_VM_NAME));
static WINDOWS_SCALE_SET_NAME_RE: Pattern = LazyLock::new(|| Regex::new(WINDOWS_SCALE_SET_NAME));

/// Windows pool indices are stored offset by this value.
const WINDOWS_POOL_INDEX_BASE: u32 = 900;

#[derive(Debug, Error)]
pub enum NameError {
    #[error("{0:?} does not match any agent name layout")]
    Unrecognised(String),

    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxVmName {
    pub pool: String,
    pub cluster_id: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsVmName {
    pub prefix: String,
    pub pool_index: u32,
    pub index: u32,
}

pub fn parse_linux_vm_name(name: &str) -> Result<LinuxVmName, NameError> {
    let re = compiled(&LINUX_VM_NAME_RE)?;
    let caps = re
        .captures(name)
        .ok_or_else(|| NameError::Unrecognised(name.to_string()))?;

    Ok(LinuxVmName {
        pool: caps[1].to_string(),
        cluster_id: caps[2].to_string(),
        index: parse_number(name, &caps[3])?,
    })
}

pub fn parse_windows_vm_name(name: &str) -> Result<WindowsVmName, NameError> {
    let re = compiled(&WINDOWS_VM_NAME_RE)?;
    let caps = re
        .captures(name)
        .ok_or_else(|| NameError::Unrecognised(name.to_string()))?;

    let digits = &caps[3];
    let (pool_digits, index_digits) = digits.split_at(3);
    Ok(WindowsVmName {
        prefix: caps[1].to_string(),
        pool_index: windows_pool_index(name, pool_digits)?,
        index: parse_number(name, index_digits)?,
    })
}

/// Returns the Windows pool index encoded in a scale set name.
pub fn parse_windows_scale_set_name(name: &str) -> Result<u32, NameError> {
    let re = compiled(&WINDOWS_SCALE_SET_NAME_RE)?;
    let caps = re
        .captures(name)
        .ok_or_else(|| NameError::Unrecognised(name.to_string()))?;
    windows_pool_index(name, &caps[3])
}

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex, NameError> {
    pattern.as_ref().map_err(|e| NameError::Pattern(e.clone()))
}

fn windows_pool_index(name: &str, digits: &str) -> Result<u32, NameError> {
    parse_number(name, digits)?
        .checked_sub(WINDOWS_POOL_INDEX_BASE)
        .ok_or_else(|| NameError::Unrecognised(name.to_string()))
}

fn parse_number(name: &str, digits: &str) -> Result<u32, NameError> {
    digits
        .parse()
        .map_err(|_| NameError::Unrecognised(name.to_string()))
}
