//! Hickory DNS authority backed by the zone store.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA, MX, NS, SOA, TXT};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::metrics::{self, QueryOutcome, Timer};
use crate::store::{AnswerRecord, LookupOutcome, RecordData, ZoneStore};

/// Catch-all authority rooted at `.`, serving every registered zone.
///
/// Zones come and go at runtime, so a static per-zone authority set does
/// not fit; the store decides authority per name instead. No-data and
/// out-of-zone questions both answer NOERROR with zero records, the
/// distinction lives in the store's counters.
pub struct StoreAuthority {
    origin: LowerName,
    store: ZoneStore,
}

impl StoreAuthority {
    /// Create a new authority over the given store.
    pub fn new(store: ZoneStore) -> Self {
        Self {
            origin: LowerName::new(&Name::root()),
            store,
        }
    }

    /// Render synthesized answers into a record set owned by `name`.
    fn build_record_set(
        &self,
        name: Name,
        rtype: RecordType,
        answers: &[AnswerRecord],
    ) -> RecordSet {
        let mut record_set = RecordSet::new(name.clone(), rtype, 0);

        for answer in answers {
            let mut record = Record::from_rdata(name.clone(), answer.ttl, render_rdata(&answer.data));
            record.set_dns_class(DNSClass::IN);
            record_set.insert(record, 0);
        }

        record_set
    }
}

/// Absolute form of a store name. Store names are validated, so a parse
/// failure cannot happen for data that got in.
fn to_fqdn(name: &str) -> Name {
    Name::from_utf8(format!("{name}.")).unwrap_or_else(|_| Name::root())
}

fn render_rdata(data: &RecordData) -> RData {
    match data {
        RecordData::A(addr) => RData::A(A::from(*addr)),
        RecordData::Aaaa(addr) => RData::AAAA(AAAA::from(*addr)),
        RecordData::Txt(payload) => RData::TXT(TXT::new(vec![payload.clone()])),
        RecordData::Mx {
            preference,
            exchange,
        } => RData::MX(MX::new(*preference, to_fqdn(exchange))),
        RecordData::Soa {
            primary,
            admin,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => RData::SOA(SOA::new(
            to_fqdn(primary),
            to_fqdn(admin),
            *serial,
            *refresh,
            *retry,
            *expire,
            *minimum,
        )),
        RecordData::Ns(zone) => RData::NS(NS(to_fqdn(zone))),
    }
}

#[async_trait]
impl Authority for StoreAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = format!("{:?}", rtype);
        let qname = name.to_string();

        trace!(name = %qname, rtype = ?rtype, "DNS lookup");

        match self.store.resolve(&qname, rtype) {
            LookupOutcome::Answer(answers) => {
                debug!(name = %qname, rtype = ?rtype, count = answers.len(), "authoritative answer");
                metrics::record_query(&rtype_str, QueryOutcome::Answer, timer.elapsed());
                let dns_name = Name::from(name.clone());
                let record_set = Arc::new(self.build_record_set(dns_name, rtype, &answers));
                LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, record_set)))
            }
            LookupOutcome::NoData => {
                debug!(name = %qname, rtype = ?rtype, "no data for type");
                metrics::record_query(&rtype_str, QueryOutcome::NoData, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
            }
            LookupOutcome::NotAuthoritative => {
                debug!(name = %qname, "name outside every zone");
                metrics::record_query(&rtype_str, QueryOutcome::NotAuthoritative, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
            }
        }
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let query = request_info.query;

        // Only class IN questions reach the resolver.
        if query.query_class() != DNSClass::IN {
            let timer = Timer::start();
            debug!(class = ?query.query_class(), "skipping non-IN question");
            metrics::record_query(
                &format!("{:?}", query.query_type()),
                QueryOutcome::Skipped,
                timer.elapsed(),
            );
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)));
        }

        self.lookup(query.name(), query.query_type(), lookup_options)
            .await
    }

    async fn soa(&self) -> LookupControlFlow<Self::Lookup> {
        // The catalog asks for an SOA while assembling negative responses.
        // Serve an empty set directly; routing through the store would
        // count a phantom lookup for every negative answer.
        LookupControlFlow::Break(Ok(LookupRecords::Empty))
    }

    async fn soa_secure(
        &self,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.soa().await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // RFC2136 updates not supported; mutations go through the HTTP API
        Err(ResponseCode::NotImp)
    }
}
