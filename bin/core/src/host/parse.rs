//! Parsers for the fixed host probe commands. Every parser is
//! defensive: a missing or mangled section yields zero values, not
//! an error.

use armada_client::entities::{
  docker::container::ProcessList,
  host::{
    DiskUsage, HostResources, ListeningPort, MemoryUsage,
    MountEntry, NetworkInterface, ServiceUnit,
  },
  scout::{ZfsDataset, ZfsPool, ZfsSnapshot},
};

pub const SECTION_SENTINEL: &str = "---";

/// Split probe output into sentinel-separated sections.
pub fn split_sections(raw: &str) -> Vec<Vec<&str>> {
  let mut sections = vec![Vec::new()];
  for line in raw.lines() {
    if line.trim() == SECTION_SENTINEL {
      sections.push(Vec::new());
    } else {
      sections
        .last_mut()
        .expect("sections always holds one entry")
        .push(line);
    }
  }
  sections
}

pub fn parse_resources(
  host_name: &str,
  raw: &str,
) -> HostResources {
  let sections = split_sections(raw);
  let section =
    |i: usize| sections.get(i).cloned().unwrap_or_default();

  let mut resources = HostResources {
    host: host_name.to_string(),
    hostname: section(0)
      .first()
      .map(|s| s.trim().to_string())
      .unwrap_or_default(),
    ..Default::default()
  };

  if let Some(line) = section(1).first() {
    let (uptime, load) = parse_uptime_line(line);
    resources.uptime = uptime;
    resources.load_average = load;
  }
  // /proc/loadavg wins over the uptime rendering when present.
  if let Some(line) = section(2).first() {
    let values: Vec<f64> = line
      .split_whitespace()
      .take(3)
      .filter_map(|v| v.parse().ok())
      .collect();
    if values.len() == 3 {
      resources.load_average = [values[0], values[1], values[2]];
    }
  }
  resources.cores = section(3)
    .first()
    .and_then(|s| s.trim().parse().ok())
    .unwrap_or_default();
  resources.cpu_percent = parse_cpu_percent(&section(4));
  resources.memory = parse_meminfo(&section(5));
  resources.disks = parse_df(&section(6).join("\n"));
  resources
}

/// `uptime` output:
/// ` 12:30:01 up 5 days,  3:02,  2 users,  load average: 0.52, 0.58, 0.59`
pub fn parse_uptime_line(line: &str) -> (String, [f64; 3]) {
  let uptime = line
    .split_once(" up ")
    .map(|(_, rest)| {
      let rest = match rest.find("load average") {
        Some(i) => &rest[..i],
        None => rest,
      };
      let rest = rest.trim().trim_end_matches(',');
      // Drop a trailing "N users" component when present.
      let rest = match rest.rsplit_once(',') {
        Some((head, tail)) if tail.contains("user") => head,
        _ => rest,
      };
      rest.trim().trim_end_matches(',').to_string()
    })
    .unwrap_or_default();

  let load = line
    .split_once("load average:")
    .map(|(_, rest)| {
      let values: Vec<f64> = rest
        .split(',')
        .filter_map(|v| v.trim().parse().ok())
        .collect();
      match values.as_slice() {
        [one, five, fifteen] => [*one, *five, *fifteen],
        _ => [0.0; 3],
      }
    })
    .unwrap_or([0.0; 3]);

  (uptime, load)
}

/// Two `/proc/stat` cpu lines sampled a second apart.
/// Busy share of the elapsed jiffies, iowait counted as idle.
fn parse_cpu_percent(lines: &[&str]) -> f64 {
  fn totals(line: &str) -> Option<(u64, u64)> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
      return None;
    }
    let values: Vec<u64> =
      fields.filter_map(|v| v.parse().ok()).collect();
    if values.len() < 5 {
      return None;
    }
    let total: u64 = values.iter().sum();
    let idle = values[3] + values[4];
    Some((total, idle))
  }

  let cpu_lines: Vec<_> = lines
    .iter()
    .filter(|line| line.starts_with("cpu "))
    .collect();
  let (Some((total_a, idle_a)), Some((total_b, idle_b))) = (
    cpu_lines.first().and_then(|l| totals(l)),
    cpu_lines.get(1).and_then(|l| totals(l)),
  ) else {
    return 0.0;
  };
  let total = total_b.saturating_sub(total_a) as f64;
  let idle = idle_b.saturating_sub(idle_a) as f64;
  if total <= 0.0 {
    return 0.0;
  }
  ((total - idle) / total * 100.0).clamp(0.0, 100.0)
}

/// `MemTotal` / `MemFree` / `MemAvailable` rows of /proc/meminfo,
/// values in kB.
fn parse_meminfo(lines: &[&str]) -> MemoryUsage {
  fn kb(line: &str) -> Option<u64> {
    line
      .split_whitespace()
      .nth(1)
      .and_then(|v| v.parse::<u64>().ok())
      .map(|v| v * 1024)
  }

  let mut memory = MemoryUsage::default();
  let mut available = None;
  for line in lines {
    if line.starts_with("MemTotal:") {
      memory.total_bytes = kb(line).unwrap_or_default();
    } else if line.starts_with("MemFree:") {
      memory.free_bytes = kb(line).unwrap_or_default();
    } else if line.starts_with("MemAvailable:") {
      available = kb(line);
    }
  }
  memory.used_bytes = memory
    .total_bytes
    .saturating_sub(available.unwrap_or(memory.free_bytes));
  memory
}

/// `df -P -B1` output, header skipped.
pub fn parse_df(raw: &str) -> Vec<DiskUsage> {
  raw
    .lines()
    .skip(1)
    .filter_map(|line| {
      let fields: Vec<&str> = line.split_whitespace().collect();
      if fields.len() < 6 {
        return None;
      }
      Some(DiskUsage {
        filesystem: fields[0].to_string(),
        total_bytes: fields[1].parse().ok()?,
        used_bytes: fields[2].parse().ok()?,
        available_bytes: fields[3].parse().ok()?,
        mount: fields[5..].join(" "),
      })
    })
    .collect()
}

/// `systemctl list-units --type=service --state=running --plain
/// --no-legend --no-pager` rows.
pub fn parse_services(raw: &str) -> Vec<ServiceUnit> {
  raw
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split_whitespace().collect();
      if fields.len() < 4 || !fields[0].ends_with(".service") {
        return None;
      }
      Some(ServiceUnit {
        unit: fields[0].to_string(),
        load: fields[1].to_string(),
        active: fields[2].to_string(),
        sub: fields[3].to_string(),
        description: fields[4..].join(" "),
      })
    })
    .collect()
}

/// `ip -json addr` output.
pub fn parse_interfaces(raw: &str) -> Vec<NetworkInterface> {
  let Ok(parsed) =
    serde_json::from_str::<Vec<serde_json::Value>>(raw)
  else {
    return Vec::new();
  };
  parsed
    .into_iter()
    .filter_map(|iface| {
      let name = iface.get("ifname")?.as_str()?.to_string();
      let state = iface
        .get("operstate")
        .and_then(|v| v.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();
      let mac = iface
        .get("address")
        .and_then(|v| v.as_str())
        .map(str::to_string);
      let addresses = iface
        .get("addr_info")
        .and_then(|v| v.as_array())
        .map(|addrs| {
          addrs
            .iter()
            .filter_map(|addr| {
              let local = addr.get("local")?.as_str()?;
              let prefix =
                addr.get("prefixlen")?.as_u64().unwrap_or(0);
              Some(format!("{local}/{prefix}"))
            })
            .collect()
        })
        .unwrap_or_default();
      Some(NetworkInterface {
        name,
        state,
        addresses,
        mac,
      })
    })
    .collect()
}

/// `findmnt -rn -o TARGET,SOURCE,FSTYPE,OPTIONS` rows.
pub fn parse_mounts(raw: &str) -> Vec<MountEntry> {
  raw
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split_whitespace().collect();
      if fields.len() < 4 {
        return None;
      }
      Some(MountEntry {
        target: fields[0].to_string(),
        source: fields[1].to_string(),
        fstype: fields[2].to_string(),
        options: fields[3].to_string(),
      })
    })
    .collect()
}

/// `ss -tulnH` rows.
pub fn parse_ports(raw: &str) -> Vec<ListeningPort> {
  raw
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split_whitespace().collect();
      if fields.len() < 5 {
        return None;
      }
      let local = fields[4];
      let (address, port) = local.rsplit_once(':')?;
      let port = port.parse().ok()?;
      let process = fields.get(6).map(|s| s.to_string());
      Some(ListeningPort {
        protocol: fields[0].to_string(),
        address: address.to_string(),
        port,
        process,
      })
    })
    .collect()
}

/// `ps aux` output.
pub fn parse_ps(raw: &str) -> ProcessList {
  let mut lines = raw.lines();
  let titles = lines
    .next()
    .map(|header| {
      header.split_whitespace().map(str::to_string).collect()
    })
    .unwrap_or_default();
  let titles: Vec<String> = titles;
  let columns = titles.len().max(1);
  let rows = lines
    .filter(|line| !line.trim().is_empty())
    .map(|line| {
      let fields: Vec<&str> = line.split_whitespace().collect();
      if fields.len() > columns {
        // Keep the trailing command column whole.
        let mut row: Vec<String> = fields[..columns - 1]
          .iter()
          .map(|s| s.to_string())
          .collect();
        row.push(fields[columns - 1..].join(" "));
        row
      } else {
        fields.into_iter().map(str::to_string).collect()
      }
    })
    .collect();
  ProcessList { titles, rows }
}

/// `zpool list -Hp -o name,size,alloc,free,cap,health` rows.
pub fn parse_zpool_list(raw: &str) -> Vec<ZfsPool> {
  raw
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split('\t').collect();
      if fields.len() < 6 {
        return None;
      }
      Some(ZfsPool {
        name: fields[0].to_string(),
        size_bytes: fields[1].parse().unwrap_or_default(),
        alloc_bytes: fields[2].parse().unwrap_or_default(),
        free_bytes: fields[3].parse().unwrap_or_default(),
        capacity_percent: fields[4].parse().unwrap_or_default(),
        health: fields[5].to_string(),
      })
    })
    .collect()
}

/// `zfs list -Hp -o name,used,avail,refer,mountpoint` rows.
pub fn parse_zfs_list(raw: &str) -> Vec<ZfsDataset> {
  raw
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split('\t').collect();
      if fields.len() < 5 {
        return None;
      }
      Some(ZfsDataset {
        name: fields[0].to_string(),
        used_bytes: fields[1].parse().unwrap_or_default(),
        available_bytes: fields[2].parse().unwrap_or_default(),
        referenced_bytes: fields[3].parse().unwrap_or_default(),
        mountpoint: fields[4].to_string(),
      })
    })
    .collect()
}

/// `zfs list -t snapshot -Hp -o name,used,refer` rows.
pub fn parse_zfs_snapshots(raw: &str) -> Vec<ZfsSnapshot> {
  raw
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split('\t').collect();
      if fields.len() < 3 {
        return None;
      }
      Some(ZfsSnapshot {
        name: fields[0].to_string(),
        used_bytes: fields[1].parse().unwrap_or_default(),
        referenced_bytes: fields[2].parse().unwrap_or_default(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  const PROBE_OUTPUT: &str = "\
tower
---
 12:30:01 up 5 days,  3:02,  2 users,  load average: 0.52, 0.58, 0.59
---
0.52 0.58 0.59 2/1024 31337
---
16
---
cpu  100 0 100 700 100 0 0 0 0 0
cpu  200 0 200 1200 200 0 0 0 0 0
---
MemTotal:       16384000 kB
MemFree:         4096000 kB
MemAvailable:    8192000 kB
---
Filesystem 1-blocks Used Available Capacity Mounted on
/dev/sda1 1000000000 600000000 400000000 60% /
/dev/sdb1 2000000000 500000000 1500000000 25% /mnt/user
";

  #[test]
  fn resources_probe_parses_every_section() {
    let res = parse_resources("tower", PROBE_OUTPUT);
    assert_eq!(res.hostname, "tower");
    assert_eq!(res.load_average, [0.52, 0.58, 0.59]);
    assert_eq!(res.cores, 16);
    // 400 busy of 900 elapsed jiffies.
    assert!((res.cpu_percent - 44.444).abs() < 0.01);
    assert_eq!(res.memory.total_bytes, 16384000 * 1024);
    assert_eq!(
      res.memory.used_bytes,
      (16384000 - 8192000) * 1024
    );
    assert_eq!(res.disks.len(), 2);
    assert_eq!(res.disks[1].mount, "/mnt/user");
    assert_eq!(res.disks[1].available_bytes, 1500000000);
  }

  #[test]
  fn resources_probe_zeroes_missing_sections() {
    let res = parse_resources("tower", "tower\n---\ngarbage");
    assert_eq!(res.hostname, "tower");
    assert_eq!(res.cores, 0);
    assert_eq!(res.cpu_percent, 0.0);
    assert_eq!(res.memory, MemoryUsage::default());
    assert!(res.disks.is_empty());

    let empty = parse_resources("tower", "");
    assert_eq!(empty.hostname, "");
  }

  #[test]
  fn uptime_line() {
    let (uptime, load) = parse_uptime_line(
      " 12:30:01 up 5 days,  3:02,  2 users,  load average: 0.52, 0.58, 0.59",
    );
    assert_eq!(uptime, "5 days,  3:02");
    assert_eq!(load, [0.52, 0.58, 0.59]);

    let (uptime, load) = parse_uptime_line("garbage");
    assert!(uptime.is_empty());
    assert_eq!(load, [0.0; 3]);
  }

  #[test]
  fn services_rows() {
    let raw = "\
sshd.service loaded active running OpenSSH server daemon
docker.service loaded active running Docker Application Container Engine
not-a-service loaded active running whatever
";
    let services = parse_services(raw);
    assert_eq!(services.len(), 2);
    assert_eq!(services[0].unit, "sshd.service");
    assert_eq!(
      services[1].description,
      "Docker Application Container Engine"
    );
  }

  #[test]
  fn interfaces_from_ip_json() {
    let raw = r#"[
      {
        "ifname": "eth0",
        "operstate": "UP",
        "address": "aa:bb:cc:dd:ee:ff",
        "addr_info": [
          { "local": "192.168.1.10", "prefixlen": 24 },
          { "local": "fe80::1", "prefixlen": 64 }
        ]
      }
    ]"#;
    let interfaces = parse_interfaces(raw);
    assert_eq!(interfaces.len(), 1);
    assert_eq!(interfaces[0].name, "eth0");
    assert_eq!(
      interfaces[0].addresses,
      vec!["192.168.1.10/24", "fe80::1/64"]
    );
    assert!(parse_interfaces("not json").is_empty());
  }

  #[test]
  fn mounts_and_ports() {
    let mounts =
      parse_mounts("/ /dev/sda1 ext4 rw,relatime\n/boot /dev/sda2 vfat rw\n");
    assert_eq!(mounts.len(), 2);
    assert_eq!(mounts[0].fstype, "ext4");

    let ports = parse_ports(
      "tcp LISTEN 0 4096 0.0.0.0:22 0.0.0.0:* users:((\"sshd\",pid=800,fd=3))\nudp UNCONN 0 0 [::]:5353 [::]:*\n",
    );
    assert_eq!(ports.len(), 2);
    assert_eq!(ports[0].port, 22);
    assert_eq!(ports[0].protocol, "tcp");
    assert_eq!(ports[1].port, 5353);
    assert_eq!(ports[1].address, "[::]");
  }

  #[test]
  fn ps_rows_keep_command_whole() {
    let raw = "\
USER PID %CPU %MEM VSZ RSS TTY STAT START TIME COMMAND
root 1 0.0 0.1 168000 11000 ? Ss Jan01 1:23 /sbin/init splash --flag
";
    let list = parse_ps(raw);
    assert_eq!(list.titles.len(), 11);
    assert_eq!(list.rows.len(), 1);
    assert_eq!(list.rows[0].len(), 11);
    assert_eq!(list.rows[0][10], "/sbin/init splash --flag");
  }

  #[test]
  fn zfs_rows() {
    let pools = parse_zpool_list(
      "tank\t1000000\t400000\t600000\t40\tONLINE\n",
    );
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].name, "tank");
    assert_eq!(pools[0].free_bytes, 600000);
    assert_eq!(pools[0].health, "ONLINE");

    let datasets = parse_zfs_list(
      "tank/media\t100\t900\t100\t/mnt/tank/media\n",
    );
    assert_eq!(datasets[0].mountpoint, "/mnt/tank/media");

    let snapshots =
      parse_zfs_snapshots("tank/media@daily\t10\t100\n");
    assert_eq!(snapshots[0].name, "tank/media@daily");
    assert!(parse_zfs_snapshots("garbage line").is_empty());
  }
}
