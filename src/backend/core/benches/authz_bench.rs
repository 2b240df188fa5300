//! Benchmarks for authorization decisions.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gatekeeper_core::authz::resources::{Job, Project};
use gatekeeper_core::authz::{
    Actor, ActorId, Authorizer, GrantContext, Kind, Level, OrganizationId, PolicyTable, ProjectId,
    Verb, Visibility,
};
use gatekeeper_core::config::AuthzConfig;
use gatekeeper_core::store::InMemoryMembershipStore;
use uuid::Uuid;

fn bench_policy_grants(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_grants");
    let table = PolicyTable::standard();
    for level in Level::ALL {
        let context = GrantContext::authenticated(Some(level), Visibility::Private, false);
        group.bench_with_input(BenchmarkId::new("project", level.as_str()), &context, |b, ctx| {
            b.iter(|| black_box(table.grants(Kind::Project, ctx)));
        });
    }
    group.bench_function("anonymous_public", |b| {
        let context = GrantContext::anonymous(Visibility::Public);
        b.iter(|| black_box(table.grants(Kind::Project, &context)));
    });
    group.finish();
}

fn bench_list_jobs(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_jobs");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let authorizer = Authorizer::standard(AuthzConfig::default()).unwrap();

    let organization = OrganizationId::random();
    let project = ProjectId::random();
    let actor = Actor::new(ActorId::random());
    let store = InMemoryMembershipStore::new()
        .with_project(project, organization)
        .with_project_membership(actor.id, project, Level::Manager);

    for count in [10usize, 100, 1_000] {
        let jobs: Vec<Job> = (0..count)
            .map(|_| Job {
                id: Uuid::new_v4(),
                project_id: project,
            })
            .collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &jobs, |b, jobs| {
            b.iter(|| {
                rt.block_on(async {
                    let mut authz = authorizer.service(&store, Some(actor.clone()));
                    for job in jobs {
                        black_box(authz.decide(Verb::Read, job).await.is_allowed());
                    }
                })
            });
        });
    }
    group.finish();
}

fn bench_fresh_decision(c: &mut Criterion) {
    let mut group = c.benchmark_group("fresh_decision");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let authorizer = Authorizer::standard(AuthzConfig::default()).unwrap();
    let organization = OrganizationId::random();
    let actor = Actor::new(ActorId::random());
    let store = InMemoryMembershipStore::new().with_organization_membership(
        actor.id,
        organization,
        Level::Owner,
    );
    let project = Project::new_in(organization);

    group.bench_function("project_update", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut authz = authorizer.service(&store, Some(actor.clone()));
                black_box(authz.can_update(&project).await.is_ok())
            })
        });
    });
    group.finish();
}

criterion_group!(benches, bench_policy_grants, bench_list_jobs, bench_fresh_decision);
criterion_main!(benches);
