//! Policy evaluation benchmarks. Run with: cargo bench --bench policy_bench
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orgauth_core::rbac::{policy, InMemoryMembershipStore, MembershipContext, MembershipContextProvider, MembershipRecord, MembershipStatus, OrganizationId, Permission, PermissionSummary, Role, UserId};
use std::sync::Arc;
use std::time::Duration;
fn ctx(role: Role, status: MembershipStatus) -> MembershipContext { MembershipContext::new(OrganizationId::new("org1"), UserId::new("u1"), role, status) }
fn bench_single_checks(c: &mut Criterion) {
    let mut g = c.benchmark_group("policy_single"); g.measurement_time(Duration::from_secs(5));
    let admin = ctx(Role::Admin, MembershipStatus::Active);
    let suspended = ctx(Role::Owner, MembershipStatus::Suspended);
    g.bench_function("can_access_allowed", |b| b.iter(|| black_box(policy::can_access(Some(&admin), black_box(Permission::MemberRemove)))));
    g.bench_function("can_access_denied", |b| b.iter(|| black_box(policy::can_access(Some(&admin), black_box(Permission::OrganizationDelete)))));
    g.bench_function("can_access_suspended", |b| b.iter(|| black_box(policy::can_access(Some(&suspended), black_box(Permission::PostView)))));
    g.bench_function("can_access_no_membership", |b| b.iter(|| black_box(policy::can_access(None, black_box(Permission::PostView)))));
    g.bench_function("can_access_token", |b| b.iter(|| black_box(policy::can_access_token(Some(&admin), black_box("member:suspend")))));
    g.bench_function("can_manage", |b| b.iter(|| black_box(policy::can_manage(&admin, black_box(Role::Member)))));
    g.finish();
}
fn bench_list_checks(c: &mut Criterion) {
    let mut g = c.benchmark_group("policy_lists"); g.measurement_time(Duration::from_secs(5));
    let member = ctx(Role::Member, MembershipStatus::Active);
    for &n in &[1usize, 5, 23] {
        let perms: Vec<Permission> = Permission::ALL.into_iter().take(n).collect();
        let tokens: Vec<&str> = perms.iter().map(|p| p.as_str()).collect();
        g.throughput(Throughput::Elements(n as u64));
        g.bench_with_input(BenchmarkId::new("all", n), &perms, |b, p| b.iter(|| black_box(policy::can_access_all(Some(&member), p))));
        g.bench_with_input(BenchmarkId::new("any", n), &perms, |b, p| b.iter(|| black_box(policy::can_access_any(Some(&member), p))));
        g.bench_with_input(BenchmarkId::new("all_tokens", n), &tokens, |b, t| b.iter(|| black_box(policy::can_access_all_tokens(Some(&member), t.as_slice()))));
    }
    g.finish();
}
fn bench_summary(c: &mut Criterion) {
    let mut g = c.benchmark_group("policy_summary"); g.measurement_time(Duration::from_secs(5));
    for role in Role::ALL {
        let ctx = ctx(role, MembershipStatus::Active);
        g.bench_with_input(BenchmarkId::new("for_context", role.as_str()), &ctx, |b, ctx| b.iter(|| black_box(PermissionSummary::for_context(ctx))));
    }
    g.finish();
}
fn bench_context_resolution(c: &mut Criterion) {
    let mut g = c.benchmark_group("policy_context"); g.measurement_time(Duration::from_secs(5));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryMembershipStore::new();
    let org = OrganizationId::new("org1");
    for i in 0..1000 { store.seed(MembershipRecord::active(UserId::new(format!("user-{}", i)), org.clone(), Role::ALL[i % 4])); }
    let provider = MembershipContextProvider::new(Arc::new(store));
    let hit = UserId::new("user-500"); let miss = UserId::new("nobody");
    g.bench_function("resolve_hit", |b| b.to_async(&rt).iter(|| async { black_box(provider.resolve(&hit, &org).await.unwrap()) }));
    g.bench_function("resolve_miss", |b| b.to_async(&rt).iter(|| async { black_box(provider.resolve(&miss, &org).await.unwrap()) }));
    g.finish();
}
criterion_group!(benches, bench_single_checks, bench_list_checks, bench_summary, bench_context_resolution);
criterion_main!(benches);
