#![cfg(feature = "memory-store")]

use fleet_gate::{
    AuthProviders, BackendChain, Email, GateConfig, Guard, MemoryBackend, MemoryDirectory,
    MemoryLocation, Permission, Principal, PrincipalId, Role, RoleSet, Router, SessionStore,
    TenantId, TenantResolver, TenantSlug,
};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

const REPEATS: usize = 5;

fn benchmark_sync<F>(name: &str, iterations: usize, mut op: F)
where
    F: FnMut(),
{
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        for _ in 0..iterations {
            op();
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / iterations as f64;
    let ops_per_sec = iterations as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (iters={iterations}, repeats={REPEATS})"
    );
}

fn benchmark_parallel<F>(name: &str, threads: usize, iterations_per_thread: usize, op_factory: F)
where
    F: Fn() -> Box<dyn FnMut() + Send> + Send + Sync + 'static,
{
    let op_factory = Arc::new(op_factory);
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        let mut joins = Vec::with_capacity(threads);
        for _ in 0..threads {
            let factory = Arc::clone(&op_factory);
            joins.push(std::thread::spawn(move || {
                let mut op = factory();
                for _ in 0..iterations_per_thread {
                    op();
                }
            }));
        }
        for join in joins {
            join.join().expect("thread panicked");
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ops = threads * iterations_per_thread;
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / total_ops as f64;
    let ops_per_sec = total_ops as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (threads={threads}, total_ops={total_ops}, repeats={REPEATS})"
    );
}

fn tenant_admin() -> Principal {
    Principal::tenant(
        PrincipalId::new(1),
        Email::try_from("admin@empresaA.com").unwrap(),
        "Company A Admin",
        Role::Admin,
        TenantId::new(1),
        TenantSlug::try_from("empresaa").unwrap(),
    )
    .unwrap()
}

fn mounted(url: &str) -> (Router, AuthProviders) {
    let config = Arc::new(GateConfig::default());
    let location = Arc::new(MemoryLocation::parse(url).unwrap());
    let session = Arc::new(SessionStore::new(
        BackendChain::session_then_persistent(
            MemoryBackend::new("session"),
            MemoryBackend::new("local"),
        ),
        location,
        &config,
    ));
    session.save(&tenant_admin()).unwrap();
    let providers =
        AuthProviders::mount(config.clone(), session, MemoryDirectory::demo().unwrap());
    let router = Router::new(config)
        .restrict("/s/usuarios", RoleSet::from(Role::Admin))
        .unwrap();
    (router, providers)
}

#[test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
fn perf_resolve_and_dispatch() {
    let iterations = 200_000;

    let resolver = TenantResolver::default();
    let hosts = [
        "empresaa.localhost",
        "localhost",
        "app.example.com",
        "example.com",
        "127.0.0.1",
    ];
    benchmark_sync("resolve_hosts", iterations, || {
        for host in hosts {
            black_box(resolver.resolve(black_box(host)));
        }
    });

    let config = GateConfig::default();
    let guard = Guard::tenant(&config);
    let admin = tenant_admin();
    let slug = TenantSlug::try_from("empresaa").unwrap();
    benchmark_sync("guard_decide_tenant", iterations, || {
        black_box(guard.decide(false, Some(&admin), Some(&slug)));
    });

    let permission = Permission::try_from("reports:export").unwrap();
    benchmark_sync("has_permission_role_table", iterations, || {
        black_box(admin.has_permission(&permission));
    });

    let (router, providers) = mounted("http://empresaa.localhost/s");
    benchmark_sync("dispatch_tenant_page", iterations / 4, || {
        black_box(router.dispatch("/s/usuarios/7", &providers).unwrap());
    });

    let threads = std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4);
    let iterations_per_thread = 50_000;

    let shared = Arc::new(mounted("http://empresaa.localhost/s"));
    benchmark_parallel(
        "dispatch_tenant_page_parallel",
        threads,
        iterations_per_thread,
        move || {
            let shared = Arc::clone(&shared);
            Box::new(move || {
                let (router, providers) = shared.as_ref();
                black_box(router.dispatch("/s/dashboard", providers).unwrap());
            })
        },
    );
}
