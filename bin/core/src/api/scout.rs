use std::{collections::BTreeMap, time::Duration};

use armada_client::{
  api::scout::*,
  entities::{
    ExecResult,
    host::{HostConfig, HostSummary},
    scout::{
      DeltaResult, DiffResult, EmitResult, FileContent, FileEntry,
      FileKind, FileStat, FindResult, HostDf, HostFileListing,
      HostProcesses, HostZfsDatasets, HostZfsPools,
      HostZfsSnapshots, LogLines, PeekResult, TransferResult,
    },
  },
  error::{AddErrorKind, Error, ErrorKind, Result},
};
use resolver_api::Resolve;

use crate::{
  exec::{
    default_exec_opts, exec_checked, exec_on_host,
    exec_on_host_with_input, exec_raw_on_host,
  },
  helpers::{collect_partial, fan_out, validate_lines,
    validate_timeout_ms},
  host::parse,
  state::host_registry,
};

use super::Args;

const MAX_DIFF_CHANGES: usize = 200;
const MAX_PEEK_LINES: i64 = 200;
const DELTA_SCAN_DEPTH: u32 = 6;
const MAX_ZFS_SNAPSHOT_ROWS: usize = 500;

fn args(list: &[&str]) -> Vec<String> {
  list.iter().map(|s| s.to_string()).collect()
}

fn secure_path(path: &str) -> Result<String> {
  validations::validate_secure_path(path)
    .with_kind(ErrorKind::InvalidInput)
}

/// Free-form operands (patterns, pool / dataset / unit names) must
/// pass the argument vetting and can never be mistaken for flags.
fn validate_operand(value: &str) -> Result<()> {
  if value.is_empty() {
    return Err(Error::msg(
      ErrorKind::InvalidInput,
      "operand must not be empty",
    ));
  }
  if value.starts_with('-') {
    return Err(Error::msg(
      ErrorKind::InvalidInput,
      "operand must not start with '-'",
    ));
  }
  validations::validate_args(std::slice::from_ref(
    &value.to_string(),
  ))
  .with_kind(ErrorKind::InvalidInput)
}

/// `stat` a remote path, mapping a failed stat to NotFound.
async fn stat_file(
  host: &HostConfig,
  path: &str,
) -> Result<FileStat> {
  let res = exec_on_host(
    host,
    "stat",
    &args(&["-c", "%F|%s|%Y", path]),
    &default_exec_opts(),
  )
  .await?;
  if !res.success {
    return Err(Error::msg(
      ErrorKind::NotFound,
      format!("'{path}' was not found on host {}", host.name),
    ));
  }
  Ok(parse_stat(path, res.stdout.trim()))
}

fn parse_stat(path: &str, raw: &str) -> FileStat {
  let mut fields = raw.split('|');
  let kind = match fields.next().unwrap_or_default() {
    "regular file" | "regular empty file" => FileKind::File,
    "directory" => FileKind::Directory,
    "symbolic link" => FileKind::Symlink,
    _ => FileKind::Other,
  };
  FileStat {
    path: path.to_string(),
    kind,
    size_bytes: fields
      .next()
      .and_then(|s| s.parse().ok())
      .unwrap_or_default(),
    modified: fields
      .next()
      .and_then(|s| s.parse().ok())
      .unwrap_or_default(),
  }
}

/// `find -printf '%y\t%s\t%T@\t%p\n'` rows.
fn parse_find_entries(stdout: &str) -> Vec<FileEntry> {
  let mut entries: Vec<FileEntry> = stdout
    .lines()
    .filter_map(|line| {
      let fields: Vec<&str> = line.split('\t').collect();
      if fields.len() < 4 {
        return None;
      }
      Some(FileEntry {
        kind: FileKind::from_type_char(
          fields[0].chars().next().unwrap_or('?'),
        ),
        size_bytes: fields[1].parse().unwrap_or_default(),
        modified: fields[2]
          .split('.')
          .next()
          .and_then(|s| s.parse().ok())
          .unwrap_or_default(),
        path: fields[3].to_string(),
      })
    })
    .collect();
  entries.sort_by(|a, b| a.path.cmp(&b.path));
  entries
}

const FIND_PRINTF: &str = "%y\t%s\t%T@\t%p\n";

async fn find_entries(
  host: &HostConfig,
  path: &str,
  min_depth: Option<u32>,
  max_depth: u32,
  file_type: Option<&str>,
  name: Option<&str>,
) -> Result<Vec<FileEntry>> {
  let mut find_args = vec![path.to_string()];
  if let Some(min_depth) = min_depth {
    find_args.push(String::from("-mindepth"));
    find_args.push(min_depth.to_string());
  }
  find_args.push(String::from("-maxdepth"));
  find_args.push(max_depth.to_string());
  if let Some(file_type) = file_type {
    find_args.push(String::from("-type"));
    find_args.push(file_type.to_string());
  }
  if let Some(name) = name {
    find_args.push(String::from("-name"));
    find_args.push(name.to_string());
  }
  find_args.push(String::from("-printf"));
  find_args.push(String::from(FIND_PRINTF));

  let res = exec_checked(
    host,
    "find",
    &find_args,
    &default_exec_opts(),
  )
  .await?;
  Ok(parse_find_entries(&res.stdout))
}

impl Resolve<Args> for ScoutRead {
  async fn resolve(self, _: &Args) -> Result<FileContent> {
    let path = secure_path(&self.path)?;
    if self.max_size == 0 || self.max_size > MAX_READ_BYTES {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'max_size' must be between 1 and {MAX_READ_BYTES}"),
      ));
    }
    let host = host_registry().find_by_name(&self.host)?;

    let stat = stat_file(host, &path).await?;
    if stat.kind != FileKind::File {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'{path}' is not a regular file"),
      ));
    }

    let raw = exec_raw_on_host(
      host,
      "head",
      &args(&["-c", &self.max_size.to_string(), &path]),
      None,
      &default_exec_opts(),
    )
    .await?;
    if !raw.success {
      return Err(Error::msg(
        ErrorKind::RemoteFailure,
        format!(
          "failed to read '{path}' on host {}: {}",
          host.name,
          String::from_utf8_lossy(&raw.stderr)
        ),
      ));
    }

    Ok(FileContent {
      host: host.name.clone(),
      path,
      content: String::from_utf8_lossy(&raw.stdout).into_owned(),
      size_bytes: stat.size_bytes,
      truncated: stat.size_bytes > self.max_size,
    })
  }
}

impl Resolve<Args> for ScoutList {
  async fn resolve(self, _: &Args) -> Result<HostFileListing> {
    let path = secure_path(&self.path)?;
    let host = host_registry().find_by_name(&self.host)?;
    let entries =
      find_entries(host, &path, Some(1), 1, None, None).await?;
    Ok(HostFileListing {
      host: host.name.clone(),
      path,
      entries,
    })
  }
}

impl Resolve<Args> for ScoutTree {
  async fn resolve(self, _: &Args) -> Result<HostFileListing> {
    let path = secure_path(&self.path)?;
    if !(1..=MAX_TREE_DEPTH).contains(&self.depth) {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'depth' must be between 1 and {MAX_TREE_DEPTH}"),
      ));
    }
    let host = host_registry().find_by_name(&self.host)?;
    let entries = find_entries(
      host,
      &path,
      Some(1),
      self.depth as u32,
      None,
      None,
    )
    .await?;
    Ok(HostFileListing {
      host: host.name.clone(),
      path,
      entries,
    })
  }
}

impl Resolve<Args> for ScoutExec {
  #[instrument(
    "ScoutExec",
    skip_all,
    fields(id = args.id.to_string(), host = self.host)
  )]
  async fn resolve(self, args: &Args) -> Result<ExecResult> {
    let tokens = validations::validate_command(&self.command)
      .with_kind(ErrorKind::InvalidInput)?;
    validate_timeout_ms(self.timeout_ms)?;
    let host = host_registry().find_by_name(&self.host)?;

    let mut opts = default_exec_opts();
    if let Some(ms) = self.timeout_ms {
      opts = opts.timeout(Duration::from_millis(ms));
    }
    exec_on_host(host, &tokens[0], &tokens[1..], &opts).await
  }
}

impl Resolve<Args> for ScoutFind {
  async fn resolve(self, _: &Args) -> Result<FindResult> {
    let path = secure_path(&self.path)?;
    if !(1..=MAX_TREE_DEPTH).contains(&self.depth) {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'depth' must be between 1 and {MAX_TREE_DEPTH}"),
      ));
    }
    if !(1..=MAX_FIND_LIMIT).contains(&self.limit) {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'limit' must be between 1 and {MAX_FIND_LIMIT}"),
      ));
    }
    if let Some(file_type) = &self.file_type
      && !matches!(file_type.as_str(), "f" | "d")
    {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        "'file_type' must be 'f' or 'd'",
      ));
    }
    if let Some(name) = &self.name {
      validate_operand(name)?;
    }
    let host = host_registry().find_by_name(&self.host)?;

    let mut matches = find_entries(
      host,
      &path,
      None,
      self.depth as u32,
      self.file_type.as_deref(),
      self.name.as_deref(),
    )
    .await?;
    let truncated = matches.len() > self.limit as usize;
    matches.truncate(self.limit as usize);
    Ok(FindResult {
      host: host.name.clone(),
      matches,
      truncated,
    })
  }
}

impl Resolve<Args> for ScoutTransfer {
  #[instrument(
    "ScoutTransfer",
    skip_all,
    fields(id = req.id.to_string())
  )]
  async fn resolve(self, req: &Args) -> Result<TransferResult> {
    let source_path = secure_path(&self.source_path)?;
    let dest_path = secure_path(&self.dest_path)?;
    if self.max_size == 0 || self.max_size > MAX_READ_BYTES {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'max_size' must be between 1 and {MAX_READ_BYTES}"),
      ));
    }
    let source = host_registry().find_by_name(&self.source_host)?;
    let dest = host_registry().find_by_name(&self.dest_host)?;

    let stat = stat_file(source, &source_path).await?;
    if stat.kind != FileKind::File {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'{source_path}' is not a regular file"),
      ));
    }
    if stat.size_bytes > self.max_size {
      return Err(Error::msg(
        ErrorKind::BufferOverflow,
        format!(
          "'{source_path}' is {} bytes, over the {} byte transfer cap",
          stat.size_bytes, self.max_size
        ),
      ));
    }

    let raw = exec_raw_on_host(
      source,
      "cat",
      &args(&[&source_path]),
      None,
      &default_exec_opts(),
    )
    .await?;
    if !raw.success {
      return Err(Error::msg(
        ErrorKind::RemoteFailure,
        format!(
          "failed to read '{source_path}' on host {}",
          source.name
        ),
      ));
    }

    write_remote_file(dest, &dest_path, &raw.stdout).await?;
    Ok(TransferResult {
      source_host: source.name.clone(),
      source_path,
      dest_host: dest.name.clone(),
      dest_path,
      bytes: raw.stdout.len() as u64,
    })
  }
}

/// Route bytes to a remote path over the executor's stdin.
async fn write_remote_file(
  host: &HostConfig,
  path: &str,
  content: &[u8],
) -> Result<()> {
  let res = exec_on_host_with_input(
    host,
    "dd",
    &args(&[&format!("of={path}"), "status=none"]),
    Some(content),
    &default_exec_opts(),
  )
  .await?;
  if res.success {
    Ok(())
  } else {
    Err(Error::msg(
      ErrorKind::RemoteFailure,
      format!(
        "failed to write '{path}' on host {}: {}",
        host.name, res.stderr
      ),
    ))
  }
}

impl Resolve<Args> for ScoutDiff {
  async fn resolve(self, _: &Args) -> Result<DiffResult> {
    let source_path = secure_path(&self.source_path)?;
    let dest_path = secure_path(&self.dest_path)?;
    let source = host_registry().find_by_name(&self.source_host)?;
    let dest = host_registry().find_by_name(&self.dest_host)?;

    let (a, b) = tokio::join!(
      read_text(source, &source_path),
      read_text(dest, &dest_path),
    );
    Ok(diff_lines(&a?, &b?))
  }
}

async fn read_text(
  host: &HostConfig,
  path: &str,
) -> Result<String> {
  let res = exec_on_host(
    host,
    "head",
    &args(&["-c", &MAX_READ_BYTES.to_string(), path]),
    &default_exec_opts(),
  )
  .await?;
  if !res.success {
    return Err(Error::msg(
      ErrorKind::NotFound,
      format!("'{path}' was not readable on host {}", host.name),
    ));
  }
  Ok(res.stdout)
}

/// Positional line comparison, bounded output.
fn diff_lines(a: &str, b: &str) -> DiffResult {
  let a_lines: Vec<&str> = a.lines().collect();
  let b_lines: Vec<&str> = b.lines().collect();
  let mut changes = Vec::new();
  let mut truncated = false;
  for i in 0..a_lines.len().max(b_lines.len()) {
    let left = a_lines.get(i);
    let right = b_lines.get(i);
    if left == right {
      continue;
    }
    if changes.len() + 2 > MAX_DIFF_CHANGES {
      truncated = true;
      break;
    }
    if let Some(left) = left {
      changes.push(format!("- {left}"));
    }
    if let Some(right) = right {
      changes.push(format!("+ {right}"));
    }
  }
  DiffResult {
    identical: changes.is_empty() && !truncated,
    source_lines: a_lines.len(),
    dest_lines: b_lines.len(),
    changes,
    truncated,
  }
}

impl Resolve<Args> for ScoutNodes {
  async fn resolve(self, _: &Args) -> Result<Vec<HostSummary>> {
    Ok(
      host_registry()
        .list()
        .iter()
        .map(HostConfig::sanitized)
        .collect(),
    )
  }
}

impl Resolve<Args> for ScoutPeek {
  async fn resolve(self, _: &Args) -> Result<PeekResult> {
    let path = secure_path(&self.path)?;
    if !(1..=MAX_PEEK_LINES).contains(&self.lines) {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'lines' must be between 1 and {MAX_PEEK_LINES}"),
      ));
    }
    let host = host_registry().find_by_name(&self.host)?;

    let stat = stat_file(host, &path).await?;
    let head = if stat.kind == FileKind::File {
      let res = exec_checked(
        host,
        "head",
        &args(&["-n", &self.lines.to_string(), &path]),
        &default_exec_opts(),
      )
      .await?;
      res.stdout.lines().map(str::to_string).collect()
    } else {
      Vec::new()
    };

    Ok(PeekResult {
      host: host.name.clone(),
      stat,
      head,
    })
  }
}

impl Resolve<Args> for ScoutDelta {
  #[instrument(
    "ScoutDelta",
    skip_all,
    fields(id = args.id.to_string())
  )]
  async fn resolve(self, args: &Args) -> Result<DeltaResult> {
    let source_path = secure_path(&self.source_path)?;
    let dest_path = secure_path(&self.dest_path)?;
    let source = host_registry().find_by_name(&self.source_host)?;
    let dest = host_registry().find_by_name(&self.dest_host)?;

    let (a, b) = tokio::join!(
      checksum_tree(source, &source_path),
      checksum_tree(dest, &dest_path),
    );
    let (a, a_truncated) = a?;
    let (b, b_truncated) = b?;

    let mut delta = compare_checksums(&a, &b);
    delta.source_host = source.name.clone();
    delta.dest_host = dest.name.clone();
    delta.truncated = a_truncated || b_truncated;
    Ok(delta)
  }
}

/// Relative path → checksum for every regular file under `root`,
/// bounded by depth and file count.
async fn checksum_tree(
  host: &HostConfig,
  root: &str,
) -> Result<(BTreeMap<String, String>, bool)> {
  let res = exec_checked(
    host,
    "find",
    &args(&[
      root,
      "-maxdepth",
      &DELTA_SCAN_DEPTH.to_string(),
      "-type",
      "f",
      "-exec",
      "sha256sum",
      "{}",
      "+",
    ]),
    &default_exec_opts(),
  )
  .await?;

  let mut checksums = BTreeMap::new();
  let mut truncated = false;
  for line in res.stdout.lines() {
    if checksums.len() >= MAX_DELTA_FILES {
      truncated = true;
      break;
    }
    let Some((hash, path)) = line.split_once("  ") else {
      continue;
    };
    let relative = path
      .strip_prefix(root)
      .unwrap_or(path)
      .trim_start_matches('/')
      .to_string();
    checksums.insert(relative, hash.to_string());
  }
  Ok((checksums, truncated))
}

fn compare_checksums(
  source: &BTreeMap<String, String>,
  dest: &BTreeMap<String, String>,
) -> DeltaResult {
  let mut added = Vec::new();
  let mut removed = Vec::new();
  let mut changed = Vec::new();
  for (path, hash) in source {
    match dest.get(path) {
      None => added.push(path.clone()),
      Some(other) if other != hash => changed.push(path.clone()),
      Some(_) => {}
    }
  }
  for path in dest.keys() {
    if !source.contains_key(path) {
      removed.push(path.clone());
    }
  }
  DeltaResult {
    source_host: String::new(),
    dest_host: String::new(),
    added,
    removed,
    changed,
    truncated: false,
  }
}

impl Resolve<Args> for ScoutEmit {
  #[instrument(
    "ScoutEmit",
    skip_all,
    fields(id = args.id.to_string(), host = self.host)
  )]
  async fn resolve(self, args: &Args) -> Result<EmitResult> {
    let path = secure_path(&self.path)?;
    if self.content.is_empty()
      || self.content.len() > MAX_EMIT_BYTES
    {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!(
          "'content' must be between 1 and {MAX_EMIT_BYTES} bytes"
        ),
      ));
    }
    let host = host_registry().find_by_name(&self.host)?;
    write_remote_file(host, &path, self.content.as_bytes())
      .await?;
    Ok(EmitResult {
      host: host.name.clone(),
      path,
      bytes: self.content.len() as u64,
    })
  }
}

impl Resolve<Args> for ScoutBeam {
  #[instrument(
    "ScoutBeam",
    skip_all,
    fields(id = req.id.to_string())
  )]
  async fn resolve(self, req: &Args) -> Result<TransferResult> {
    let source_path = secure_path(&self.source_path)?;
    let dest_path = secure_path(&self.dest_path)?;
    let source = host_registry().find_by_name(&self.source_host)?;
    let dest = host_registry().find_by_name(&self.dest_host)?;

    let stat = stat_file(source, &source_path).await?;
    if stat.kind != FileKind::Directory {
      return Err(Error::msg(
        ErrorKind::InvalidInput,
        format!("'{source_path}' is not a directory"),
      ));
    }

    // The whole tree moves as one tar stream through the control
    // plane, subject to the executor buffer cap.
    let raw = exec_raw_on_host(
      source,
      "tar",
      &args(&["-c", "-C", &source_path, "-f", "-", "."]),
      None,
      &default_exec_opts(),
    )
    .await?;
    if !raw.success {
      return Err(Error::msg(
        ErrorKind::RemoteFailure,
        format!(
          "failed to pack '{source_path}' on host {}",
          source.name
        ),
      ));
    }

    let unpack = exec_on_host_with_input(
      dest,
      "tar",
      &args(&["-x", "-C", &dest_path, "-f", "-"]),
      Some(&raw.stdout),
      &default_exec_opts(),
    )
    .await?;
    if !unpack.success {
      return Err(Error::msg(
        ErrorKind::RemoteFailure,
        format!(
          "failed to unpack into '{dest_path}' on host {}: {}",
          dest.name, unpack.stderr
        ),
      ));
    }

    Ok(TransferResult {
      source_host: source.name.clone(),
      source_path,
      dest_host: dest.name.clone(),
      dest_path,
      bytes: raw.stdout.len() as u64,
    })
  }
}

impl Resolve<Args> for ScoutPs {
  async fn resolve(self, _: &Args) -> Result<Vec<HostProcesses>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "ps",
        &args(&["aux"]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostProcesses {
        host: host.name.clone(),
        processes: parse::parse_ps(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("scout ps", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for ScoutDfRequest {
  async fn resolve(self, _: &Args) -> Result<Vec<HostDf>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "df",
        &args(&["-P", "-B1"]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostDf {
        host: host.name.clone(),
        disks: parse::parse_df(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("scout df", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for ScoutZfsPools {
  async fn resolve(self, _: &Args) -> Result<Vec<HostZfsPools>> {
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let outcomes = fan_out(hosts, |host| async move {
      let res = exec_checked(
        host,
        "zpool",
        &args(&[
          "list",
          "-Hp",
          "-o",
          "name,size,alloc,free,cap,health",
        ]),
        &default_exec_opts(),
      )
      .await?;
      Ok(HostZfsPools {
        host: host.name.clone(),
        pools: parse::parse_zpool_list(&res.stdout),
      })
    })
    .await;
    let mut rows = collect_partial("zfs pools", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for ScoutZfsDatasets {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<Vec<HostZfsDatasets>> {
    if let Some(pool) = &self.pool {
      validate_operand(pool)?;
    }
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let pool = self.pool.clone();
    let outcomes = fan_out(hosts, |host| {
      let pool = pool.clone();
      async move {
        let mut list_args = args(&[
          "list",
          "-Hp",
          "-o",
          "name,used,avail,refer,mountpoint",
          "-r",
        ]);
        if let Some(pool) = &pool {
          list_args.push(pool.clone());
        }
        let res = exec_checked(
          host,
          "zfs",
          &list_args,
          &default_exec_opts(),
        )
        .await?;
        Ok(HostZfsDatasets {
          host: host.name.clone(),
          datasets: parse::parse_zfs_list(&res.stdout),
        })
      }
    })
    .await;
    let mut rows = collect_partial("zfs datasets", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

impl Resolve<Args> for ScoutZfsSnapshots {
  async fn resolve(
    self,
    _: &Args,
  ) -> Result<Vec<HostZfsSnapshots>> {
    if let Some(dataset) = &self.dataset {
      validate_operand(dataset)?;
    }
    let hosts =
      host_registry().all_or_one(self.host.as_deref())?;
    let dataset = self.dataset.clone();
    let outcomes = fan_out(hosts, |host| {
      let dataset = dataset.clone();
      async move {
        let mut list_args = args(&[
          "list",
          "-t",
          "snapshot",
          "-Hp",
          "-o",
          "name,used,refer",
        ]);
        if let Some(dataset) = &dataset {
          list_args.push(String::from("-r"));
          list_args.push(dataset.clone());
        }
        let res = exec_checked(
          host,
          "zfs",
          &list_args,
          &default_exec_opts(),
        )
        .await?;
        let mut snapshots =
          parse::parse_zfs_snapshots(&res.stdout);
        snapshots.truncate(MAX_ZFS_SNAPSHOT_ROWS);
        Ok(HostZfsSnapshots {
          host: host.name.clone(),
          snapshots,
        })
      }
    })
    .await;
    let mut rows = collect_partial("zfs snapshots", outcomes);
    rows.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(rows)
  }
}

/// Tail a system log file, trying each candidate path in order.
async fn tail_log_file(
  host: &HostConfig,
  candidates: &[&str],
  lines: i64,
  grep: Option<&str>,
  source: &str,
) -> Result<LogLines> {
  let mut last_error: Option<Error> = None;
  for path in candidates {
    let res = exec_on_host(
      host,
      "tail",
      &args(&["-n", &lines.to_string(), path]),
      &default_exec_opts(),
    )
    .await;
    match res {
      Ok(res) if res.success => {
        return Ok(LogLines {
          host: host.name.clone(),
          source: source.to_string(),
          lines: filter_lines(&res.stdout, grep),
        });
      }
      Ok(res) => {
        last_error = Some(Error::msg(
          ErrorKind::RemoteFailure,
          format!("failed to read {path}: {}", res.stderr.trim()),
        ));
      }
      Err(e) => last_error = Some(e),
    }
  }
  Err(
    last_error.unwrap_or_else(|| {
      Error::msg(ErrorKind::NotFound, "no log file candidates")
    }),
  )
}

fn filter_lines(raw: &str, grep: Option<&str>) -> Vec<String> {
  raw
    .lines()
    .filter(|line| {
      grep.map(|needle| line.contains(needle)).unwrap_or(true)
    })
    .map(str::to_string)
    .collect()
}

fn validate_grep(grep: Option<&String>) -> Result<()> {
  if let Some(grep) = grep {
    validations::validate_args(std::slice::from_ref(grep))
      .with_kind(ErrorKind::InvalidInput)?;
  }
  Ok(())
}

impl Resolve<Args> for ScoutLogsSyslog {
  async fn resolve(self, _: &Args) -> Result<LogLines> {
    validate_lines(self.lines)?;
    validate_grep(self.grep.as_ref())?;
    let host = host_registry().find_by_name(&self.host)?;
    tail_log_file(
      host,
      &["/var/log/syslog", "/var/log/messages"],
      self.lines,
      self.grep.as_deref(),
      "syslog",
    )
    .await
  }
}

impl Resolve<Args> for ScoutLogsJournal {
  async fn resolve(self, _: &Args) -> Result<LogLines> {
    validate_lines(self.lines)?;
    validate_grep(self.grep.as_ref())?;
    if let Some(unit) = &self.unit {
      validate_operand(unit)?;
    }
    let host = host_registry().find_by_name(&self.host)?;

    let mut journal_args = args(&["--no-pager", "-n"]);
    journal_args.push(self.lines.to_string());
    if let Some(unit) = &self.unit {
      journal_args.push(String::from("-u"));
      journal_args.push(unit.clone());
    }
    let res = exec_checked(
      host,
      "journalctl",
      &journal_args,
      &default_exec_opts(),
    )
    .await?;
    Ok(LogLines {
      host: host.name.clone(),
      source: String::from("journal"),
      lines: filter_lines(&res.stdout, self.grep.as_deref()),
    })
  }
}

impl Resolve<Args> for ScoutLogsDmesg {
  async fn resolve(self, _: &Args) -> Result<LogLines> {
    validate_lines(self.lines)?;
    validate_grep(self.grep.as_ref())?;
    let host = host_registry().find_by_name(&self.host)?;
    let res =
      exec_checked(host, "dmesg", &[], &default_exec_opts())
        .await?;
    let filtered =
      filter_lines(&res.stdout, self.grep.as_deref());
    let skip =
      filtered.len().saturating_sub(self.lines as usize);
    Ok(LogLines {
      host: host.name.clone(),
      source: String::from("dmesg"),
      lines: filtered.into_iter().skip(skip).collect(),
    })
  }
}

impl Resolve<Args> for ScoutLogsAuth {
  async fn resolve(self, _: &Args) -> Result<LogLines> {
    validate_lines(self.lines)?;
    validate_grep(self.grep.as_ref())?;
    let host = host_registry().find_by_name(&self.host)?;
    tail_log_file(
      host,
      &["/var/log/auth.log", "/var/log/secure"],
      self.lines,
      self.grep.as_deref(),
      "auth",
    )
    .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stat_parsing() {
    let stat =
      parse_stat("/etc/hostname", "regular file|21|1712345678");
    assert_eq!(stat.kind, FileKind::File);
    assert_eq!(stat.size_bytes, 21);
    assert_eq!(stat.modified, 1712345678);

    let dir = parse_stat("/etc", "directory|4096|1712345678");
    assert_eq!(dir.kind, FileKind::Directory);

    let garbage = parse_stat("/x", "whatever");
    assert_eq!(garbage.kind, FileKind::Other);
    assert_eq!(garbage.size_bytes, 0);
  }

  #[test]
  fn find_entries_parsing_sorts_by_path() {
    let stdout = "\
f\t120\t1712345678.1234\t/stacks/plex/docker-compose.yml
d\t4096\t1712345600.0000\t/stacks/arr
l\t10\t1712345601.5\t/stacks/link
";
    let entries = parse_find_entries(stdout);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].path, "/stacks/arr");
    assert_eq!(entries[0].kind, FileKind::Directory);
    assert_eq!(entries[1].kind, FileKind::Symlink);
    assert_eq!(entries[2].kind, FileKind::File);
    assert_eq!(entries[2].size_bytes, 120);
    assert_eq!(entries[2].modified, 1712345678);
  }

  #[test]
  fn diff_detects_changed_lines() {
    let diff = diff_lines("a\nb\nc\n", "a\nB\nc\nd\n");
    assert!(!diff.identical);
    assert_eq!(diff.source_lines, 3);
    assert_eq!(diff.dest_lines, 4);
    assert_eq!(diff.changes, vec!["- b", "+ B", "+ d"]);

    let same = diff_lines("x\n", "x\n");
    assert!(same.identical);
    assert!(same.changes.is_empty());
  }

  #[test]
  fn checksum_comparison() {
    let mut source = BTreeMap::new();
    source.insert("a.txt".to_string(), "h1".to_string());
    source.insert("b.txt".to_string(), "h2".to_string());
    source.insert("c.txt".to_string(), "h3".to_string());
    let mut dest = BTreeMap::new();
    dest.insert("b.txt".to_string(), "h2".to_string());
    dest.insert("c.txt".to_string(), "other".to_string());
    dest.insert("d.txt".to_string(), "h4".to_string());

    let delta = compare_checksums(&source, &dest);
    assert_eq!(delta.added, vec!["a.txt"]);
    assert_eq!(delta.removed, vec!["d.txt"]);
    assert_eq!(delta.changed, vec!["c.txt"]);
  }

  #[test]
  fn operand_vetting() {
    assert!(validate_operand("tank/media").is_ok());
    assert!(validate_operand("-rf").is_err());
    assert!(validate_operand("").is_err());
    assert!(validate_operand("a;b").is_err());
  }
}
