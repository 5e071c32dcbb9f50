use std::fmt;

/// Resource category a gauge family belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    EphemeralStorage,
    ContainerMemory,
    ContainerRootfs,
    ContainerLogs,
    PodVolume,
}

/// The object a series is keyed on, which decides its trailing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Pod,
    Container,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Measurement {
    UsageBytes,
    AvailableBytes,
    CapacityBytes,
    InodesUsed,
    InodesFree,
    InodesTotal,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::EphemeralStorage,
        Category::ContainerMemory,
        Category::ContainerRootfs,
        Category::ContainerLogs,
        Category::PodVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EphemeralStorage => "ephemeral_storage",
            Category::ContainerMemory => "container_memory",
            Category::ContainerRootfs => "container_rootfs",
            Category::ContainerLogs => "container_logs",
            Category::PodVolume => "pod_volume",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Category::EphemeralStorage => Scope::Pod,
            Category::ContainerMemory | Category::ContainerRootfs | Category::ContainerLogs => {
                Scope::Container
            }
            Category::PodVolume => Scope::Volume,
        }
    }

    /// Memory has no inode concept.
    pub fn has_inodes(&self) -> bool {
        !matches!(self, Category::ContainerMemory)
    }

    pub fn measurements(&self) -> &'static [Measurement] {
        if self.has_inodes() {
            &Measurement::ALL
        } else {
            &Measurement::BYTES
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Category::EphemeralStorage => "Ephemeral storage",
            Category::ContainerMemory => "Container memory",
            Category::ContainerRootfs => "Container root file system",
            Category::ContainerLogs => "Container logs",
            Category::PodVolume => "Pod volume",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Measurement {
    pub const BYTES: [Measurement; 3] = [
        Measurement::UsageBytes,
        Measurement::AvailableBytes,
        Measurement::CapacityBytes,
    ];

    pub const INODES: [Measurement; 3] = [
        Measurement::InodesUsed,
        Measurement::InodesFree,
        Measurement::InodesTotal,
    ];

    pub const ALL: [Measurement; 6] = [
        Measurement::UsageBytes,
        Measurement::AvailableBytes,
        Measurement::CapacityBytes,
        Measurement::InodesUsed,
        Measurement::InodesFree,
        Measurement::InodesTotal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::UsageBytes => "usage_bytes",
            Measurement::AvailableBytes => "available_bytes",
            Measurement::CapacityBytes => "capacity_bytes",
            Measurement::InodesUsed => "inodes_used",
            Measurement::InodesFree => "inodes_free",
            Measurement::InodesTotal => "inodes_total",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Measurement::UsageBytes => "used space in bytes",
            Measurement::AvailableBytes => "available space in bytes",
            Measurement::CapacityBytes => "capacity in bytes",
            Measurement::InodesUsed => "number of used inodes",
            Measurement::InodesFree => "number of free inodes",
            Measurement::InodesTotal => "total number of inodes",
        }
    }
}

/// `[<prefix>_]<category>_<measurement>`
pub fn metric_name(prefix: &str, category: Category, measurement: Measurement) -> String {
    if prefix.is_empty() {
        format!("{}_{}", category.as_str(), measurement.as_str())
    } else {
        format!("{}_{}_{}", prefix, category.as_str(), measurement.as_str())
    }
}

pub fn metric_help(category: Category, measurement: Measurement) -> String {
    format!("{} {}", category.description(), measurement.description())
}

/// Label names for a family, in the order values are supplied.
pub fn label_names(scope: Scope, with_uid: bool) -> Vec<&'static str> {
    let mut names = vec!["pod", "namespace", "node"];
    if with_uid {
        names.push("uid");
    }
    match scope {
        Scope::Pod => {}
        Scope::Container => names.push("container"),
        Scope::Volume => names.push("volume"),
    }
    names
}

/// Identity of one series: the pod it belongs to plus, for container and
/// volume families, the container or volume name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesLabels {
    pub pod: String,
    pub namespace: String,
    pub node: String,
    pub uid: Option<String>,
    pub object: Option<String>,
}

impl SeriesLabels {
    pub fn pod(pod: &str, namespace: &str, node: &str, uid: Option<&str>) -> Self {
        Self {
            pod: pod.to_string(),
            namespace: namespace.to_string(),
            node: node.to_string(),
            uid: uid.map(str::to_string),
            object: None,
        }
    }

    /// Same pod, narrowed to a container or volume.
    pub fn with_object(&self, name: &str) -> Self {
        Self {
            object: Some(name.to_string()),
            ..self.clone()
        }
    }

    /// Label values matching `label_names(scope, with_uid)`.
    pub fn values(&self, with_uid: bool) -> Vec<&str> {
        let mut values = vec![self.pod.as_str(), self.namespace.as_str(), self.node.as_str()];
        if with_uid {
            values.push(self.uid.as_deref().unwrap_or(""));
        }
        if let Some(object) = self.object.as_deref() {
            values.push(object);
        }
        values
    }
}
