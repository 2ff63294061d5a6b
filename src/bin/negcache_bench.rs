//! Concurrency-exercising demo binary for the negative cache (SPEC_FULL.md
//! §1.1, §5): spins up plain OS-thread workers hammering a single
//! `NegativeCache` with a mix of ingest and synthesis calls, reporting
//! throughput and final memory usage.
//!
//! Grounded on the teacher's `src/bin/stress_test.rs` (clap-parsed
//! client/query counts, `tracing_subscriber::fmt()` init), adapted from
//! `tokio::main` async clients to plain `std::thread` workers since the
//! cache itself is synchronous (§5: "parallel OS threads", not tasks).
//! Opens no sockets — this is a harness for the lock, not a DNS server.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use negcache::Name;
use negcache::cache::NegativeCache;
use negcache::collab::RrsetCache;
use negcache::dns::enums::{DNSResourceClass, DNSResourceType};
use negcache::dns::header::DNSHeader;
use negcache::dns::packet::DNSPacket;
use negcache::dns::question::Query;
use negcache::dns::resource::DNSResource;
use negcache::dnssec::nsec::RecordTypeBitmap;
use parking_lot::Mutex;

/// A minimal in-memory RRset-cache stand-in for this demo binary. The real
/// RRset cache is an external collaborator (SPEC_FULL.md §1); this harness
/// only needs something behind the `RrsetCache` seam to exercise ingest and
/// synthesis together.
#[derive(Default)]
struct DemoRrsetCache {
    entries: Mutex<HashMap<(Name, DNSResourceType, DNSResourceClass), (Vec<DNSResource>, u64)>>,
}

impl DemoRrsetCache {
    fn insert(&self, owner: Name, rtype: DNSResourceType, rclass: DNSResourceClass, records: Vec<DNSResource>, expires_at: u64) {
        self.entries.lock().insert((owner, rtype, rclass), (records, expires_at));
    }
}

impl RrsetCache for DemoRrsetCache {
    fn lookup(
        &self,
        owner: &Name,
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        now: u64,
    ) -> Option<(Vec<DNSResource>, u32)> {
        let entries = self.entries.lock();
        let (records, expires_at) = entries.get(&(owner.clone(), rtype, rclass))?;
        if *expires_at <= now {
            return None;
        }
        Some((records.clone(), (*expires_at - now) as u32))
    }

    fn mark_expired(&self, handle: &negcache::RrsetHandle) {
        self.entries.lock().remove(&(handle.owner.clone(), handle.rtype, handle.rclass));
    }
}

#[derive(Parser, Debug)]
#[command(name = "negcache-bench", version, about = "Hammer the negative cache concurrently")]
struct Args {
    /// Number of worker threads issuing ingest/synthesis calls.
    #[arg(short, long, default_value_t = 8)]
    threads: usize,

    /// Total operations per worker thread.
    #[arg(short, long, default_value_t = 20_000)]
    operations: u64,

    /// Number of distinct zones to spread ingested denials across.
    #[arg(short, long, default_value_t = 16)]
    zones: u32,

    /// LRU byte budget for the cache under test.
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    cache_size_bytes: usize,
}

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let cache = Arc::new(NegativeCache::new(args.cache_size_bytes, 150));
    let rrset_cache = Arc::new(DemoRrsetCache::default());

    tracing::info!(
        threads = args.threads,
        operations = args.operations,
        zones = args.zones,
        "starting negcache-bench"
    );

    let started = Instant::now();
    let handles: Vec<_> = (0..args.threads)
        .map(|worker_id| {
            let cache = Arc::clone(&cache);
            let rrset_cache = Arc::clone(&rrset_cache);
            let operations = args.operations;
            let zone_count = args.zones;
            thread::spawn(move || worker(worker_id, operations, zone_count, &cache, &rrset_cache))
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    let elapsed = started.elapsed();
    let total_ops = args.threads as u64 * args.operations;
    println!(
        "{total_ops} operations across {} threads in {elapsed:?} ({:.0} ops/sec), {} bytes resident",
        args.threads,
        total_ops as f64 / elapsed.as_secs_f64(),
        cache.memory_in_use()
    );
}

fn worker(worker_id: usize, operations: u64, zone_count: u32, cache: &NegativeCache, rrset_cache: &DemoRrsetCache) {
    for i in 0..operations {
        let zone_index = (worker_id as u64 * operations + i) % zone_count as u64;
        let zone_name = Name::parse(&format!("zone{zone_index}.bench.")).unwrap();

        if i % 4 == 0 {
            let owner = Name::parse(&format!("host{i}.zone{zone_index}.bench.")).unwrap();
            let next = Name::parse(&format!("host{}.zone{zone_index}.bench.", i + 1)).unwrap();
            let reply = build_reply(&zone_name, &owner, &next);
            cache.add_reply(&reply);

            let mut nsec_rdata = Vec::new();
            for label in next.labels() {
                nsec_rdata.push(label.len() as u8);
                nsec_rdata.extend_from_slice(label);
            }
            nsec_rdata.push(0);
            nsec_rdata.extend_from_slice(&RecordTypeBitmap::from_types([DNSResourceType::A]).encode());
            rrset_cache.insert(
                owner,
                DNSResourceType::NSEC,
                DNSResourceClass::IN,
                vec![DNSResource {
                    owner: Name::parse(&format!("host{i}.zone{zone_index}.bench.")).unwrap(),
                    rtype: DNSResourceType::NSEC,
                    rclass: DNSResourceClass::IN,
                    ttl: 3600,
                    rdata: nsec_rdata,
                    parsed_rdata: None,
                }],
                i + 3600,
            );
            rrset_cache.insert(
                zone_name.clone(),
                DNSResourceType::SOA,
                DNSResourceClass::IN,
                vec![soa_record(&zone_name)],
                i + 3600,
            );
        } else {
            let query = Query {
                qname: Name::parse(&format!("missing{i}.zone{zone_index}.bench.")).unwrap(),
                qtype: DNSResourceType::A,
                qclass: DNSResourceClass::IN,
            };
            let _ = cache.get_message(&query, rrset_cache, i);
        }
    }
}

fn build_reply(zone_name: &Name, owner: &Name, next: &Name) -> DNSPacket {
    let mut reply = DNSPacket::new(DNSHeader::default());
    reply.authorities.push(soa_record(zone_name));

    let mut rdata = Vec::new();
    for label in next.labels() {
        rdata.push(label.len() as u8);
        rdata.extend_from_slice(label);
    }
    rdata.push(0);
    rdata.extend_from_slice(&RecordTypeBitmap::from_types([DNSResourceType::A]).encode());

    reply.authorities.push(DNSResource {
        owner: owner.clone(),
        rtype: DNSResourceType::NSEC,
        rclass: DNSResourceClass::IN,
        ttl: 3600,
        rdata,
        parsed_rdata: None,
    });
    reply
}

fn soa_record(zone_name: &Name) -> DNSResource {
    DNSResource {
        owner: zone_name.clone(),
        rtype: DNSResourceType::SOA,
        rclass: DNSResourceClass::IN,
        ttl: 3600,
        rdata: Vec::new(),
        parsed_rdata: Some("ns1.bench. hostmaster.bench. 1 3600 900 604800 300".to_string()),
    }
}
