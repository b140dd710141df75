use std::fmt;

/// Where a tensor's storage lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Place {
    #[default]
    Cpu,
    Gpu(usize),
    Custom { device_type: String, id: usize },
}

/// Kernel backend a place dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    Cpu,
    Gpu,
    Custom,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Cpu, Backend::Gpu, Backend::Custom];
}

impl Place {
    pub fn backend(&self) -> Backend {
        match self {
            Place::Cpu => Backend::Cpu,
            Place::Gpu(_) => Backend::Gpu,
            Place::Custom { .. } => Backend::Custom,
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Cpu => write!(f, "cpu"),
            Place::Gpu(id) => write!(f, "gpu:{id}"),
            Place::Custom { device_type, id } => write!(f, "{device_type}:{id}"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
            Backend::Custom => "custom",
        };
        write!(f, "{s}")
    }
}
