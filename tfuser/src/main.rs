use grid_provision::builders::{
    Buildable, CapacityReservationBuilder, ContainerBuilder, K8sBuilder, ReservationBuilder,
    VirtualMachineBuilder, VolumeBuilder, WorkloadBuilder, ZdbBuilder,
};
use grid_provision::client::{DeleteOutcome, ReservationClient};
use grid_provision::config::Config;
use grid_provision::encryption::{SealedBoxEncryptor, SecretEncryptor};
use grid_provision::escrow::format_amount;
use grid_provision::explorer::{CapacityPoolCreateResponse, HttpExplorer};
use grid_provision::reservation::Reservation;
use grid_provision::scan::{ScanFilter, Scanner};
use grid_provision::schema::Date;
use grid_provision::workloads::{ContainerCapacity, DiskType, NetworkConnection, Workload, ZdbMode};
use grid_provision::{ProvisionError, ProvisionErrorKind, ProvisionResult};
use log::LevelFilter;
use log::{debug, error, info};
use log4rs::append::rolling_file::policy::compound::{
    roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config as LogConfig, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::{Filter, Response};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use structopt::StructOpt;
use tokio_util::sync::CancellationToken;

const MIB: u64 = 1 << 20;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(StructOpt, Debug)]
#[structopt(about = "threefold grid reservation tool")]
/// Threefold grid reservation tool
///
/// Stages workloads, and bundles them into signed reservations which are submitted to the
/// explorer. Also manages the capacity pools paying for the workloads.
struct Opts {
    /// Path to the config file to use for this invocation.
    #[structopt(
        name = "config",
        default_value = "tfuser.toml",
        long,
        short,
        parse(from_os_str)
    )]
    config: PathBuf,
    /// Path to the log file to use. The logfile will automatically roll over if the size
    /// increases beyond 10MiB.
    #[structopt(
        name = "log_file",
        default_value = "tfuser.log",
        long,
        parse(from_os_str)
    )]
    log_file: PathBuf,
    /// Sign reservations, but print them instead of sending them to the explorer.
    #[structopt(name = "dry-run", long)]
    dry_run: bool,
    #[structopt(subcommand)]
    cmd: Cmd,
}

#[derive(StructOpt, Debug)]
enum Cmd {
    /// Build a workload and stage it in a file
    ///
    /// The workload is validated and its secrets are encrypted for the node it is deployed on,
    /// so the staged file never holds a plaintext secret.
    Generate {
        /// Path of the file to write the staged workload to.
        #[structopt(name = "output", long, short, parse(from_os_str))]
        output: PathBuf,
        #[structopt(subcommand)]
        workload: GenerateCmd,
    },
    /// Bundle staged workloads into a reservation and submit it
    ///
    /// The staged workloads are taken as they are, and the reservation is signed with the key of
    /// the configured user. The escrow to pay is printed once the explorer accepted the
    /// reservation.
    Provision {
        /// Staged workload files to include in the reservation.
        #[structopt(name = "schema", long, short, parse(from_os_str), required = true)]
        schemas: Vec<PathBuf>,
        /// Lifetime of the reservation in days. Defaults to the configured duration.
        #[structopt(name = "duration", long, short)]
        duration_days: Option<u32>,
        /// Description of the reservation.
        #[structopt(name = "description", long)]
        description: Option<String>,
    },
    /// Sign a reservation for deletion
    Delete {
        /// Id of the reservation to delete.
        #[structopt(name = "reservation", long, short)]
        reservation: i64,
    },
    /// Manage capacity pools
    Pool(PoolCmd),
    /// List live reservations of the user
    ///
    /// Looks up every reservation id in the given range, and prints the ones owned by the
    /// configured user. Stop with ctrl-c.
    Live {
        /// First reservation id to look up.
        #[structopt(name = "start", long, default_value = "1")]
        start: i64,
        /// Reservation id to stop at, exclusive.
        #[structopt(name = "end", long)]
        end: i64,
        /// Also list deleted reservations.
        #[structopt(name = "deleted", long)]
        deleted: bool,
        /// Also list expired reservations.
        #[structopt(name = "expired", long)]
        expired: bool,
    },
}

#[derive(StructOpt, Debug)]
enum GenerateCmd {
    /// A container running an flist
    Container {
        /// Node to deploy on.
        #[structopt(long)]
        node: String,
        /// Url of the flist.
        #[structopt(long)]
        flist: String,
        /// Amount of virtual cpus.
        #[structopt(long, default_value = "1")]
        cpu: u64,
        /// Memory in MiB.
        #[structopt(long, default_value = "1024")]
        memory: u64,
        /// Size of the root filesystem in MiB.
        #[structopt(long, default_value = "256")]
        disk_size: u64,
        /// Medium of the root filesystem, hdd or ssd.
        #[structopt(long, default_value = "ssd")]
        disk_type: DiskType,
        /// Command to start the container with.
        #[structopt(long)]
        entrypoint: Option<String>,
        /// Start the container in interactive mode.
        #[structopt(long)]
        interactive: bool,
        /// Environment variables, as `KEY=VALUE`.
        #[structopt(long = "env")]
        envs: Vec<String>,
        /// Volumes to mount, as `volume:/path`.
        #[structopt(long = "mount")]
        mounts: Vec<String>,
        /// Network to connect the container to.
        #[structopt(long)]
        network: Option<String>,
        /// Address of the container in the network.
        #[structopt(long)]
        ip: Option<IpAddr>,
    },
    /// A volume
    Volume {
        /// Node to deploy on.
        #[structopt(long)]
        node: String,
        /// Size in GiB.
        #[structopt(long)]
        size: u64,
        /// Medium of the volume, hdd or ssd.
        #[structopt(long, default_value = "hdd")]
        disk_type: DiskType,
    },
    /// A 0-db namespace
    Zdb {
        /// Node to deploy on.
        #[structopt(long)]
        node: String,
        /// Size in GiB.
        #[structopt(long)]
        size: u64,
        /// Mode of the namespace, seq or user.
        #[structopt(long, default_value = "seq")]
        mode: ZdbMode,
        /// Medium of the namespace, hdd or ssd.
        #[structopt(long, default_value = "hdd")]
        disk_type: DiskType,
        /// Password of the namespace.
        #[structopt(long)]
        password: Option<String>,
        /// Make the namespace publicly readable.
        #[structopt(long)]
        public: bool,
    },
    /// A kubernetes node
    K8s {
        /// Node to deploy on.
        #[structopt(long)]
        node: String,
        /// Size tier of the vm.
        #[structopt(long, default_value = "1")]
        size: u16,
        /// Network to connect the vm to.
        #[structopt(long)]
        network: String,
        /// Address of the vm in the network.
        #[structopt(long)]
        ip: IpAddr,
        /// Secret shared by the nodes of the cluster.
        #[structopt(long)]
        secret: String,
        /// Masters to join. Without masters, this node becomes a master itself.
        #[structopt(long = "master")]
        master_ips: Vec<IpAddr>,
        /// Ssh keys allowed on the vm.
        #[structopt(long = "ssh-key")]
        ssh_keys: Vec<String>,
    },
    /// A virtual machine
    Vm {
        /// Node to deploy on.
        #[structopt(long)]
        node: String,
        /// Name of the image to run.
        #[structopt(long)]
        name: String,
        /// Size tier of the vm.
        #[structopt(long, default_value = "1")]
        size: u16,
        /// Network to connect the vm to.
        #[structopt(long)]
        network: String,
        /// Address of the vm in the network.
        #[structopt(long)]
        ip: IpAddr,
        /// Ssh keys allowed on the vm.
        #[structopt(long = "ssh-key")]
        ssh_keys: Vec<String>,
    },
}

#[derive(StructOpt, Debug)]
enum PoolCmd {
    /// Buy capacity, in a new pool or an existing one
    Create {
        /// Nodes the capacity can be used on.
        #[structopt(name = "node", long, required = true)]
        node_ids: Vec<String>,
        /// Compute unit seconds to buy.
        #[structopt(long, default_value = "0")]
        cus: u64,
        /// Storage unit seconds to buy.
        #[structopt(long, default_value = "0")]
        sus: u64,
        /// Public IPv4 unit seconds to buy.
        #[structopt(long, default_value = "0")]
        ipv4us: u64,
        /// Pool to add the capacity to. A new pool is created if not set.
        #[structopt(long)]
        pool: Option<i64>,
    },
    /// Show a pool
    Get {
        /// Id of the pool.
        #[structopt(long)]
        pool: i64,
    },
    /// List the pools of the user
    List,
    /// Buy enough capacity to keep a pool running at its current usage
    Extend {
        /// Id of the pool.
        #[structopt(long)]
        pool: i64,
        /// Amount of days the pool must last.
        #[structopt(long, default_value = "30")]
        days: u64,
    },
}

/// ModuleFilter is a naive log filter which only allows (child modules of) the given modules.
#[derive(Debug)]
struct ModuleFilter {
    modules: Vec<String>,
}

impl Filter for ModuleFilter {
    fn filter(&self, record: &log::Record) -> Response {
        if let Some(mod_path) = record.module_path() {
            // this is technically not correct but sufficient for our purposes
            if self.modules.iter().any(|m| mod_path.starts_with(m.as_str())) {
                return Response::Neutral;
            }
        }
        Response::Reject
    }
}

#[tokio::main]
async fn main() -> ProvisionResult<()> {
    if let Err(e) = real_main().await {
        error!("{}", e);
        return Err(e);
    }

    Ok(())
}

async fn real_main() -> ProvisionResult<()> {
    let opts = Opts::from_args();

    init_logger(&opts.log_file)?;

    match opts.cmd {
        // staging workloads does not need an identity
        Cmd::Generate { output, workload } => generate(&output, workload)?,
        Cmd::Provision {
            schemas,
            duration_days,
            description,
        } => {
            let session = Session::open(&opts.config)?;
            let duration = match duration_days {
                Some(days) => chrono::Duration::days(days as i64),
                None => session.cfg.duration(),
            };
            let mut builder = ReservationBuilder::new().with_duration(duration);
            if let Some(description) = description {
                builder = builder.with_description(description);
            }
            for path in &schemas {
                builder = builder.add(load_staged(path)?);
            }
            let reservation = builder.build()?;

            if opts.dry_run {
                print_json(&session.client.prepare(reservation)?)?;
                return Ok(());
            }

            let response = session.client.deploy(reservation).await?;
            println!("reservation {} created", response.id);
            let escrow = &response.escrow_information;
            for detail in &escrow.details {
                println!(
                    "farmer {}: {} {}",
                    detail.farmer_id,
                    format_amount(detail.total_amount),
                    escrow.asset
                );
            }
            println!(
                "pay {} {} to {}",
                format_amount(escrow.total()?),
                escrow.asset,
                escrow.address
            );
        }
        Cmd::Delete { reservation } => {
            let session = Session::open(&opts.config)?;
            match session.client.delete_reservation(reservation).await? {
                DeleteOutcome::Signed => {
                    println!("reservation {} marked for deletion", reservation)
                }
                DeleteOutcome::NothingToDelete(state) => {
                    println!("reservation {} is already {}", reservation, state)
                }
            }
        }
        Cmd::Pool(cmd) => pool(Session::open(&opts.config)?, cmd, opts.dry_run).await?,
        Cmd::Live {
            start,
            end,
            deleted,
            expired,
        } => {
            let session = Session::open(&opts.config)?;
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("scan interrupted");
                    ctrl_c.cancel();
                }
            });

            let filter = ScanFilter {
                customer_tid: session.cfg.user_id(),
                include_deleted: deleted,
                include_expired: expired,
            };
            let scanner = Scanner::new(session.explorer, session.cfg.scan_pool_size());
            let mut reservations = scanner.scan(start..end, filter, cancel);
            while let Some(reservation) = reservations.recv().await {
                print_reservation(&reservation);
            }
        }
    }

    Ok(())
}

/// Everything needed to talk to the explorer as the configured user.
struct Session {
    cfg: Config,
    explorer: Arc<HttpExplorer>,
    client: ReservationClient<Arc<HttpExplorer>>,
}

impl Session {
    fn open(path: &Path) -> ProvisionResult<Session> {
        let cfg = Config::load(path)?;
        let identity = Arc::new(cfg.identity()?);
        let explorer = Arc::new(HttpExplorer::new(cfg.explorer_url(), identity.clone()));
        let client = ReservationClient::new(
            explorer.clone(),
            identity.clone(),
            cfg.currencies().to_vec(),
        );
        debug!(
            "acting as user {} on explorer {}",
            identity.id(),
            cfg.explorer_url()
        );
        Ok(Session {
            cfg,
            explorer,
            client,
        })
    }
}

async fn pool(session: Session, cmd: PoolCmd, dry_run: bool) -> ProvisionResult<()> {
    let client = &session.client;
    match cmd {
        PoolCmd::Create {
            node_ids,
            cus,
            sus,
            ipv4us,
            pool,
        } => {
            let mut builder = CapacityReservationBuilder::new(node_ids)
                .with_cus(cus)
                .with_sus(sus)
                .with_ipv4us(ipv4us);
            if let Some(pool) = pool {
                builder = builder.with_pool_id(pool);
            }
            let data = builder.build()?;

            if dry_run {
                return print_json(&data);
            }
            print_pool_escrow(&client.deploy_capacity_pool(data).await?);
        }
        PoolCmd::Get { pool } => print_json(&client.pool_get(pool).await?)?,
        PoolCmd::List => {
            for pool in client.pools_by_owner().await? {
                println!(
                    "pool {}: {} cu, {} su, {} ipv4u left, empty at {}",
                    pool.pool_id, pool.cus, pool.sus, pool.ipv4us, pool.empty_at
                );
            }
        }
        PoolCmd::Extend { pool, days } => {
            match client.extend_pool(pool, days * SECONDS_PER_DAY).await? {
                Some(response) => print_pool_escrow(&response),
                None => println!("pool {} already lasts {} days", pool, days),
            }
        }
    }
    Ok(())
}

fn init_logger(path: &Path) -> ProvisionResult<()> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tfuser");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{{}}.{}", stem, ext),
        None => format!("{}.{{}}", stem),
    };
    let rolled_log_file = path.with_file_name(name);

    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(10 * MIB)),
        Box::new(
            FixedWindowRoller::builder()
                .build(&rolled_log_file.to_string_lossy(), 5)
                .map_err(|e| logger_error(e.to_string()))?,
        ),
    );
    let log_file = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S %Z)(local)}: {l} {m}{n}",
        )))
        .build(path, Box::new(policy))
        .map_err(|e| ProvisionError::new_io(format!("log file {}", path.display()), e))?;
    let log_config = LogConfig::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ModuleFilter {
                    modules: vec!["grid_provision".to_string(), "tfuser".to_string()],
                }))
                .build("logfile", Box::new(log_file)),
        )
        .logger(Logger::builder().build("filelogger", LevelFilter::Debug))
        .build(Root::builder().appender("logfile").build(LevelFilter::Debug))
        .map_err(|e| logger_error(e.to_string()))?;
    log4rs::init_config(log_config).map_err(|e| logger_error(e.to_string()))?;

    Ok(())
}

fn logger_error(msg: String) -> ProvisionError {
    ProvisionError::new(ProvisionErrorKind::Config, msg.into())
}

fn generate(output: &Path, cmd: GenerateCmd) -> ProvisionResult<()> {
    let encryptor = SealedBoxEncryptor::new();
    match cmd {
        GenerateCmd::Container {
            node,
            flist,
            cpu,
            memory,
            disk_size,
            disk_type,
            entrypoint,
            interactive,
            envs,
            mounts,
            network,
            ip,
        } => {
            let capacity = ContainerCapacity {
                cpu,
                memory,
                disk_type,
                disk_size,
            };
            let mut builder = ContainerBuilder::new(node, flist, capacity)
                .with_interactive(interactive)
                .with_envs(&envs)?
                .with_mounts(&mounts)?;
            if let Some(entrypoint) = entrypoint {
                builder = builder.with_entrypoint(entrypoint);
            }
            match (network, ip) {
                (Some(network_id), Some(ipaddress)) => {
                    builder = builder.with_network_connection(NetworkConnection {
                        network_id,
                        ipaddress,
                        public_ip6: false,
                        yggdrasil_ip: false,
                    })
                }
                (None, None) => {}
                _ => {
                    return Err(ProvisionError::new(
                        ProvisionErrorKind::Validation,
                        "network and ip must be set together".into(),
                    ))
                }
            }
            stage(output, builder, &encryptor)
        }
        GenerateCmd::Volume {
            node,
            size,
            disk_type,
        } => stage(
            output,
            VolumeBuilder::new(node, size, disk_type),
            &encryptor,
        ),
        GenerateCmd::Zdb {
            node,
            size,
            mode,
            disk_type,
            password,
            public,
        } => {
            let mut builder = ZdbBuilder::new(node, size, mode, disk_type).with_public(public);
            if let Some(password) = password {
                builder = builder.with_password(password);
            }
            stage(output, builder, &encryptor)
        }
        GenerateCmd::K8s {
            node,
            size,
            network,
            ip,
            secret,
            master_ips,
            ssh_keys,
        } => stage(
            output,
            K8sBuilder::new(node, size, network, ip)
                .with_cluster_secret(secret)
                .with_master_ips(master_ips)
                .with_ssh_keys(ssh_keys),
            &encryptor,
        ),
        GenerateCmd::Vm {
            node,
            name,
            size,
            network,
            ip,
            ssh_keys,
        } => stage(
            output,
            VirtualMachineBuilder::new(node, name, size, network, ip).with_ssh_keys(ssh_keys),
            &encryptor,
        ),
    }
}

fn stage<W: Buildable>(
    output: &Path,
    builder: WorkloadBuilder<W>,
    encryptor: &dyn SecretEncryptor,
) -> ProvisionResult<()> {
    let workload = builder.build(encryptor)?;
    let file = File::create(output)
        .map_err(|e| ProvisionError::new_io(format!("staged workload {}", output.display()), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &workload)?;
    writer
        .flush()
        .map_err(|e| ProvisionError::new_io(format!("staged workload {}", output.display()), e))?;
    info!(
        "staged {} workload in {}",
        workload.workload_type(),
        output.display()
    );
    Ok(())
}

fn load_staged(path: &Path) -> ProvisionResult<Workload> {
    let file = File::open(path)
        .map_err(|e| ProvisionError::new_io(format!("staged workload {}", path.display()), e))?;
    let workload: Workload = serde_json::from_reader(BufReader::new(file))?;
    // only built workloads have their secrets encrypted
    if workload.info().epoch.is_zero() {
        return Err(ProvisionError::new(
            ProvisionErrorKind::Validation,
            format!(
                "{} does not hold a built workload, stage it with generate",
                path.display()
            )
            .into(),
        ));
    }
    Ok(workload)
}

fn print_json<T: serde::Serialize>(value: &T) -> ProvisionResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out).map_err(|e| ProvisionError::new_io("stdout".to_string(), e))
}

fn print_pool_escrow(response: &CapacityPoolCreateResponse) {
    let escrow = &response.escrow_information;
    println!("capacity reservation {} created", response.reservation_id);
    println!(
        "pay {} {} to {}",
        format_amount(escrow.amount),
        escrow.asset,
        escrow.address
    );
}

fn print_reservation(reservation: &Reservation) {
    let data = &reservation.data_reservation;
    let expires = if reservation.is_expired(Date::now()) {
        "expired"
    } else {
        "expires"
    };
    println!(
        "reservation {}: {}, {} workloads, {} {}",
        reservation.id,
        reservation.next_action,
        data.workloads().len(),
        expires,
        data.expiration_reservation
    );
}

#[cfg(test)]
mod tests {
    use super::{generate, load_staged, GenerateCmd};
    use grid_provision::encryption::decrypt_secret;
    use grid_provision::identity::Identity;
    use grid_provision::workloads::{DiskType, Workload, ZdbMode};
    use std::fs;
    use std::path::PathBuf;

    fn staged_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tfuser-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn generated_zdb_holds_no_plaintext_password() {
        let node = Identity::from_seed(0, &[42u8; 32]).unwrap();
        let path = staged_path("zdb");
        generate(
            &path,
            GenerateCmd::Zdb {
                node: node.node_id(),
                size: 10,
                mode: ZdbMode::Seq,
                disk_type: DiskType::Ssd,
                password: Some("hunter2".to_string()),
                public: false,
            },
        )
        .unwrap();

        let staged = fs::read_to_string(&path).unwrap();
        assert!(!staged.contains("hunter2"));

        let workload = load_staged(&path).unwrap();
        fs::remove_file(&path).unwrap();
        match workload {
            Workload::Zdb(zdb) => {
                assert_eq!(decrypt_secret(&zdb.password, &node).unwrap(), "hunter2")
            }
            other => panic!("unexpected workload {:?}", other),
        }
    }

    #[test]
    fn unbuilt_workloads_are_refused() {
        let path = staged_path("unbuilt");
        fs::write(&path, r#"{"workload_type": 2, "node_id": "node1", "size": 10}"#).unwrap();
        let err = load_staged(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("does not hold a built workload"));
    }
}
